use super::active_list::ActiveList;

/// Applies the beam to a scored active list.
pub trait Pruner {
    fn start(&mut self) {}

    fn prune(&mut self, list: Box<dyn ActiveList>) -> Box<dyn ActiveList>;

    fn stop(&mut self) {}
}

/// Delegates to the list's own `purge`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplePruner;

impl Pruner for SimplePruner {
    fn prune(&mut self, mut list: Box<dyn ActiveList>) -> Box<dyn ActiveList> {
        list.purge();
        list
    }
}
