//! Ordered step registration shared by the pre- and post-transformation pipelines.

/// A registered step tagged with its sort key.
#[derive(Debug, Clone)]
pub struct OrderedStep<T> {
    pub order: i32,
    pub step: T,
}

/// Steps kept sorted by ascending `order`; equal orders keep registration order.
///
/// ```
/// use tabseq_data::step::OrderedSteps;
///
/// let mut steps = OrderedSteps::new();
/// steps.push("c", 3);
/// steps.push("a1", 1);
/// steps.push("b", 2);
/// steps.push("a2", 1);
/// let names = steps.iter().map(|s| s.step).collect::<Vec<_>>();
/// assert_eq!(names, ["a1", "a2", "b", "c"]);
/// ```
#[derive(Debug, Clone)]
pub struct OrderedSteps<T> {
    steps: Vec<OrderedStep<T>>,
}

impl<T> Default for OrderedSteps<T> {
    fn default() -> Self {
        Self { steps: vec![] }
    }
}

impl<T> OrderedSteps<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `step` after every already registered step with `order <= order`.
    pub fn push(&mut self, step: T, order: i32) {
        let pos = self.steps.partition_point(|s| s.order <= order);
        self.steps.insert(pos, OrderedStep { order, step });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &OrderedStep<T>> + '_ {
        self.steps.iter()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}
