use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::event::Event;
use crate::module::Module;

/// Open panels, in tab order, looked up by id.
///
/// Panels come and go at runtime: charts are registered when opened and
/// removed when closed. Removal rebuilds the id index so a closed chart
/// can no longer be reached by routed events.
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
    active_idx: Option<usize>,
    index: HashMap<String, usize>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            active_idx: None,
            index: HashMap::new(),
        }
    }

    pub fn register(&mut self, module: Box<dyn Module>) -> Result<()> {
        let id = module.id().to_string();
        if self.index.contains_key(&id) {
            bail!("duplicate module id: {}", id);
        }
        let idx = self.modules.len();
        self.index.insert(id, idx);
        self.modules.push(module);
        if self.active_idx.is_none() {
            self.active_idx = Some(0);
        }
        Ok(())
    }

    /// Remove a panel. Returns it with the lifecycle events the removal
    /// caused (focus moves to the previous tab if the removed one was
    /// active).
    pub fn remove(&mut self, id: &str) -> Result<(Box<dyn Module>, Vec<Event>)> {
        let Some(idx) = self.index.get(id).copied() else {
            bail!("unknown module id: {}", id);
        };

        let was_active = self.active_idx == Some(idx);
        let module = self.modules.remove(idx);
        self.rebuild_index();

        let mut events = Vec::new();
        if self.modules.is_empty() {
            self.active_idx = None;
            if was_active {
                events.push(Event::ModuleDeactivated { id: id.to_string() });
            }
            return Ok((module, events));
        }

        match self.active_idx {
            Some(active) if was_active => {
                let next = active.saturating_sub(1).min(self.modules.len() - 1);
                self.active_idx = Some(next);
                events.push(Event::ModuleDeactivated { id: id.to_string() });
                events.push(Event::ModuleActivated {
                    id: self.modules[next].id().to_string(),
                });
            }
            Some(active) if active > idx => self.active_idx = Some(active - 1),
            _ => {}
        }
        Ok((module, events))
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id().to_string(), i))
            .collect();
    }

    /// Activate a module by ID. Returns lifecycle events (deactivated old, activated new).
    pub fn activate(&mut self, id: &str) -> Result<Vec<Event>> {
        match self.index.get(id).copied() {
            Some(i) => {
                let from = self.active_idx.unwrap_or(i);
                Ok(self.switch_to(from, i))
            }
            None => bail!("unknown module id: {}", id),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn active(&self) -> Option<&dyn Module> {
        self.active_idx.map(|i| &*self.modules[i])
    }

    pub fn active_mut(&mut self) -> Option<&mut (dyn Module + 'static)> {
        self.active_idx.map(|i| &mut *self.modules[i])
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_idx.map(|i| self.modules[i].id())
    }

    pub fn cycle_next(&mut self) -> Vec<Event> {
        if self.modules.is_empty() {
            return Vec::new();
        }
        let cur = self.active_idx.unwrap_or(0);
        let next = (cur + 1) % self.modules.len();
        self.switch_to(cur, next)
    }

    pub fn cycle_prev(&mut self) -> Vec<Event> {
        if self.modules.is_empty() {
            return Vec::new();
        }
        let cur = self.active_idx.unwrap_or(0);
        let next = if cur == 0 {
            self.modules.len() - 1
        } else {
            cur - 1
        };
        self.switch_to(cur, next)
    }

    fn switch_to(&mut self, from: usize, to: usize) -> Vec<Event> {
        let mut events = Vec::new();
        if from != to {
            events.push(Event::ModuleDeactivated {
                id: self.modules[from].id().to_string(),
            });
        }
        self.active_idx = Some(to);
        events.push(Event::ModuleActivated {
            id: self.modules[to].id().to_string(),
        });
        events
    }

    pub fn list(&self) -> Vec<(&str, &str)> {
        self.modules.iter().map(|m| (m.id(), m.title())).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Module> {
        self.modules.iter().map(|m| &**m)
    }

    pub fn get(&self, id: &str) -> Option<&dyn Module> {
        self.index.get(id).map(|&i| &*self.modules[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut (dyn Module + 'static)> {
        self.index.get(id).copied().map(|i| &mut *self.modules[i])
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Route an event. Returns `false` if it had a target that is not open.
    ///
    /// Tick, Resize, OpenCharts and Quit go to every module; Key to the
    /// active one; lifecycle, pause and sample events to the module they
    /// name. A sample for a chart that was closed in the meantime is
    /// dropped here. Open and close requests belong to the app shell.
    pub fn broadcast(&mut self, event: &Event) -> bool {
        match event {
            Event::Tick { .. }
            | Event::Resize { .. }
            | Event::OpenCharts { .. }
            | Event::Quit => {
                for m in &mut self.modules {
                    m.handle_event(event);
                }
                true
            }
            Event::Key(_) => {
                if let Some(m) = self.active_mut() {
                    m.handle_event(event);
                }
                true
            }
            Event::ModuleActivated { id }
            | Event::ModuleDeactivated { id }
            | Event::TogglePause { id } => self.route(id, event),
            Event::Sample(delivery) => {
                let routed = self.route(&delivery.instance.chart, event);
                if !routed {
                    tracing::debug!(
                        instance = %delivery.instance,
                        "dropping sample for closed chart"
                    );
                }
                routed
            }
            Event::OpenChart { .. } | Event::CloseChart { .. } => true,
        }
    }

    fn route(&mut self, id: &str, event: &Event) -> bool {
        match self.index.get(id).copied() {
            Some(idx) => {
                self.modules[idx].handle_event(event);
                true
            }
            None => false,
        }
    }
}
