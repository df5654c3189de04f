use std::collections::HashMap;

use crate::montage::channel::{ChannelDefinition, ChannelFilters, DataGap};
use crate::prelude::{DerivationError, DerivationResult};

/// Unpadded window last requested for a montage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    pub start: i64,
    pub end: i64,
    pub gaps: Vec<DataGap>,
}

/// Named, ordered list of channel derivations.
#[derive(Debug, Clone, PartialEq)]
pub struct Montage {
    pub name: String,
    pub channels: Vec<ChannelDefinition>,
    /// Set by [`MontageRegistry::set_window`]; re-planned by
    /// [`MontageRegistry::replan`].
    pub window: Option<WindowRequest>,
}

impl Montage {
    fn plan<F>(&mut self, padding_for: &mut F)
    where
        F: FnMut(&ChannelDefinition) -> usize,
    {
        let Some(window) = &self.window else {
            return;
        };
        for channel in self.channels.iter_mut() {
            let padding = padding_for(channel);
            channel.plan_window(window.start, window.end, &window.gaps, padding);
        }
    }
}

/// Stores montages by name and tracks which one is active.
///
/// The active montage is held by name, so overwriting it with
/// [`add`](Self::add) takes effect immediately.
#[derive(Debug, Default)]
pub struct MontageRegistry {
    montages: HashMap<String, Montage>,
    active: Option<String>,
}

impl MontageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `channels` under `name`, replacing any previous montage.
    pub fn add(&mut self, name: &str, channels: Vec<ChannelDefinition>) {
        self.montages.insert(
            name.to_string(),
            Montage {
                name: name.to_string(),
                channels,
                window: None,
            },
        );
    }

    pub fn set_active(&mut self, name: &str) -> DerivationResult<()> {
        if !self.montages.contains_key(name) {
            return Err(DerivationError::MontageNotFound(name.to_string()));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn active(&self) -> Option<&Montage> {
        self.active.as_ref().and_then(|name| self.montages.get(name))
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Montage> {
        self.montages.get(name)
    }

    fn get_mut(&mut self, name: &str) -> DerivationResult<&mut Montage> {
        self.montages
            .get_mut(name)
            .ok_or_else(|| DerivationError::MontageNotFound(name.to_string()))
    }

    /// Replaces per-channel filter overrides; one entry per montage channel.
    pub fn set_filters(
        &mut self,
        name: &str,
        filters: Vec<Option<ChannelFilters>>,
    ) -> DerivationResult<()> {
        let montage = self.get_mut(name)?;
        if filters.len() != montage.channels.len() {
            return Err(DerivationError::Configuration(format!(
                "montage `{}` has {} channel(s) but {} filter override(s) were given",
                name,
                montage.channels.len(),
                filters.len()
            )));
        }
        for (channel, override_set) in montage.channels.iter_mut().zip(filters) {
            channel.filters = override_set;
        }
        Ok(())
    }

    /// Plans the same window for every channel of `name`; `padding_for`
    /// yields the filter padding of each channel.
    pub fn set_window<F>(
        &mut self,
        name: &str,
        start: i64,
        end: i64,
        gaps: &[DataGap],
        mut padding_for: F,
    ) -> DerivationResult<()>
    where
        F: FnMut(&ChannelDefinition) -> usize,
    {
        let montage = self.get_mut(name)?;
        montage.window = Some(WindowRequest {
            start,
            end,
            gaps: gaps.to_vec(),
        });
        montage.plan(&mut padding_for);
        Ok(())
    }

    /// Re-plans every montage that has a window, after the padding or the
    /// filters behind `padding_for` changed.
    pub fn replan<F>(&mut self, mut padding_for: F)
    where
        F: FnMut(&ChannelDefinition) -> usize,
    {
        for montage in self.montages.values_mut() {
            montage.plan(&mut padding_for);
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.montages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
