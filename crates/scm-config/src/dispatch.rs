//! Sparse routing tables from resolved source keys to channel chains.

use std::collections::HashMap;

use scm_tables::SourceClass;

/// Handle of a linked channel: its position in the channel chain.
pub type ChanHandle = usize;

/// The two routing tables the acquisition pipeline dispatches through.
///
/// Fixed-rate and decimated channels key on (source class, sub-field);
/// digitizer-backed channels key on (dispatch group, frequency bit). A key
/// may carry any number of channels; insertion order within a chain is
/// preserved so downstream iteration stays deterministic.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchTables {
    by_source: HashMap<(SourceClass, u16), Vec<ChanHandle>>,
    by_group: HashMap<(u8, u8), Vec<ChanHandle>>,
}

impl DispatchTables {
    pub fn insert_source(&mut self, class: SourceClass, sub_field: u16, chan: ChanHandle) {
        self.by_source
            .entry((class, sub_field))
            .or_default()
            .push(chan);
    }

    pub fn insert_group(&mut self, group: u8, freq_bit: u8, chan: ChanHandle) {
        self.by_group.entry((group, freq_bit)).or_default().push(chan);
    }

    /// Channels registered for a (source class, sub-field) key, in
    /// insertion order.
    pub fn source_chain(&self, class: SourceClass, sub_field: u16) -> &[ChanHandle] {
        self.by_source
            .get(&(class, sub_field))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Channels registered for a (group, frequency bit) key, in insertion
    /// order.
    pub fn group_chain(&self, group: u8, freq_bit: u8) -> &[ChanHandle] {
        self.by_group
            .get(&(group, freq_bit))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Occupied (source class, sub-field) slots. Slot order is arbitrary;
    /// each chain keeps insertion order.
    pub fn source_slots(&self) -> impl Iterator<Item = ((SourceClass, u16), &[ChanHandle])> {
        self.by_source.iter().map(|(key, chain)| (*key, chain.as_slice()))
    }

    /// Occupied (group, frequency bit) slots.
    pub fn group_slots(&self) -> impl Iterator<Item = ((u8, u8), &[ChanHandle])> {
        self.by_group.iter().map(|(key, chain)| (*key, chain.as_slice()))
    }

    /// Number of occupied routing slots across both tables.
    pub fn slot_count(&self) -> usize {
        self.by_source.len() + self.by_group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty() && self.by_group.is_empty()
    }
}
