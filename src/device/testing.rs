//! In-memory parameter store shared by the controller, fade and sampler tests.

use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{Arc, Mutex},
};

use super::DeviceIo;

#[derive(Debug, Default)]
struct Inner {
    present: bool,
    params: HashMap<String, String>,
    writes: Vec<(String, String)>,
    failing: HashSet<String>,
}

/// Cloneable handle onto a fake driver; clones observe the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryIo {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryIo {
    /// A present keyboard at full brightness, powered on, all zones blue.
    pub fn keyboard() -> Self {
        let io = Self::default();
        {
            let mut inner = io.inner.lock().unwrap();
            inner.present = true;
            for (name, value) in [
                ("kb_brightness", "10"),
                ("kb_off", "0"),
                ("kb_left", "1"),
                ("kb_center", "1"),
                ("kb_right", "1"),
            ] {
                inner.params.insert(name.to_string(), format!("{value}\n"));
            }
        }
        io
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn set_raw(&self, name: &str, value: &str) {
        self.inner
            .lock()
            .unwrap()
            .params
            .insert(name.to_string(), value.to_string());
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .params
            .get(name)
            .map(|v| v.trim().to_string())
    }

    /// Every successful write in order, as `(parameter, value)`.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn writes_to(&self, name: &str) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(param, _)| param == name)
            .map(|(_, value)| value)
            .collect()
    }

    /// Makes every subsequent write to `name` fail.
    pub fn fail_writes_to(&self, name: &str) {
        self.inner.lock().unwrap().failing.insert(name.to_string());
    }

    pub fn heal(&self, name: &str) {
        self.inner.lock().unwrap().failing.remove(name);
    }
}

impl DeviceIo for MemoryIo {
    fn is_present(&self) -> bool {
        self.inner.lock().unwrap().present
    }

    fn read_param(&self, name: &str) -> io::Result<String> {
        self.inner
            .lock()
            .unwrap()
            .params
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn write_param(&self, name: &str, value: &str) -> io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failing.contains(name) {
            return Err(io::Error::other(format!("injected failure on {name}")));
        }
        inner.params.insert(name.to_string(), value.to_string());
        inner.writes.push((name.to_string(), value.to_string()));
        Ok(())
    }
}
