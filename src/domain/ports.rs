/// Infers attributes a class assigns at runtime, from its constructor source text
/// (implemented by adapters)
pub trait RuntimeAttrDetector: Send + Sync {
    /// Attribute names assigned on the receiver inside `source`
    fn detect(&self, source: &str) -> Vec<String>;

    /// Get the language this detector is for
    fn language(&self) -> &str;
}

/// Observes the lifecycle of awaitables created while it is installed
pub trait AwaitableObserver: Send + Sync {
    fn created(&self, id: u64, label: &str);

    fn awaited(&self, id: u64);
}
