#[derive(Clone, PartialEq, Eq, Debug)]
/// Config values for [`Coalescer`].
pub struct CoalescerConfig {
    /// How many calls may be in flight at once
    pub max_concurrent: Option<usize>,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: Some(100),
        }
    }
}
