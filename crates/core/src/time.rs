//! Time keepers — the shared "current time" read by time value fields.

use std::cell::{Cell, RefCell};

use crate::resource::Resource;

/// A named clock holding the current time.
///
/// Change it through [`Managed::modify`](crate::resource::Managed::modify)
/// so dependent fields hear about it.
#[derive(Debug)]
pub struct TimeKeeper {
    name: RefCell<String>,
    time: Cell<f64>,
}

impl TimeKeeper {
    pub fn new(name: &str, time: f64) -> Self {
        Self {
            name: RefCell::new(name.to_string()),
            time: Cell::new(time),
        }
    }

    pub fn time(&self) -> f64 {
        self.time.get()
    }

    pub fn set_time(&self, time: f64) {
        self.time.set(time);
    }
}

impl Resource for TimeKeeper {
    fn name(&self) -> String {
        self.name.borrow().clone()
    }

    fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ChangeKind, Manager};
    use std::rc::Rc;

    #[test]
    fn modify_through_manager_notifies() {
        let manager = Manager::new();
        let keeper = manager.add(TimeKeeper::new("default", 0.0)).unwrap();
        let seen = Rc::new(Cell::new(None));
        let sink = Rc::clone(&seen);
        let _sub = keeper.subscribe(move |m| sink.set(Some(m.kind)));
        keeper.modify(|k| k.set_time(2.5));
        assert_eq!(keeper.time(), 2.5);
        assert_eq!(seen.get(), Some(ChangeKind::ObjectChanged));
    }
}
