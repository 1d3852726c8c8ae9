//! Fakes em memória para os testes do núcleo.

use crate::display::ReadingsView;
use crate::outputs::{Broker, Indicator, Qos, StatusDisplay};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub qos: Qos,
}

/// Broker que grava tudo que foi publicado. Clones compartilham o registro.
#[derive(Debug, Clone, Default)]
pub struct RecordingBroker {
    pub log: Rc<RefCell<Vec<Published>>>,
}

impl RecordingBroker {
    pub fn messages(&self) -> Vec<Published> {
        self.log.borrow().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.log.borrow().iter().map(|p| p.topic.clone()).collect()
    }
}

impl Broker for RecordingBroker {
    fn publish(&mut self, topic: &str, payload: &str, qos: Qos) {
        self.log.borrow_mut().push(Published {
            topic: topic.into(),
            payload: payload.into(),
            qos,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountingIndicator {
    pub toggles: Rc<RefCell<usize>>,
}

impl CountingIndicator {
    pub fn count(&self) -> usize {
        *self.toggles.borrow()
    }
}

impl Indicator for CountingIndicator {
    fn toggle(&mut self) {
        *self.toggles.borrow_mut() += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    pub shown: Rc<RefCell<Vec<String>>>,
    pub views: Rc<RefCell<Vec<ReadingsView>>>,
}

impl RecordingDisplay {
    pub fn last(&self) -> Option<String> {
        self.shown.borrow().last().cloned()
    }

    pub fn last_view(&self) -> Option<ReadingsView> {
        self.views.borrow().last().copied()
    }
}

impl StatusDisplay for RecordingDisplay {
    fn show_status(&mut self, status: &str) {
        self.shown.borrow_mut().push(status.into());
    }

    fn show_readings(&mut self, view: &ReadingsView) {
        self.views.borrow_mut().push(*view);
    }
}
