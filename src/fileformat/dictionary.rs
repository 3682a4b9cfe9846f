use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::read::{CalibrationData, EndReasonData, PoreData, RunInfoData};


/// Index of a row in one of the metadata dictionaries
pub type DictionaryIndex = u32;


/// Deduplicating append-only dictionary. Equal entries resolve to the
/// index they were first assigned, so a run's worth of reads sharing one
/// RunInfoData costs a single dictionary row.
#[derive(Debug, Clone)]
pub struct DictionaryWriter<T> {
    entries: Vec<T>,
    lookup: HashMap<T, DictionaryIndex>,
}

impl<T: Hash + Eq + Clone> DictionaryWriter<T> {
    pub fn new() -> DictionaryWriter<T> {
        DictionaryWriter {
            entries: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub fn add(&mut self, item: &T) -> DictionaryIndex {
        if let Some(index) = self.lookup.get(item) {
            return *index;
        }
        let index = self.entries.len() as DictionaryIndex;
        self.entries.push(item.clone());
        self.lookup.insert(item.clone(), index);
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order, for serialization at close
    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}

impl<T: Hash + Eq + Clone> Default for DictionaryWriter<T> {
    fn default() -> Self {
        Self::new()
    }
}


pub type PoreWriter = DictionaryWriter<PoreData>;
pub type CalibrationWriter = DictionaryWriter<CalibrationData>;
pub type EndReasonWriter = DictionaryWriter<EndReasonData>;
pub type RunInfoWriter = DictionaryWriter<RunInfoData>;


/// The four dictionaries every reads table carries
#[derive(Debug, Clone)]
pub struct DictionaryWriters {
    pub pores: PoreWriter,
    pub calibrations: CalibrationWriter,
    pub end_reasons: EndReasonWriter,
    pub run_infos: RunInfoWriter,
}

pub fn make_dictionary_writers() -> DictionaryWriters {
    DictionaryWriters {
        pores: PoreWriter::new(),
        calibrations: CalibrationWriter::new(),
        end_reasons: EndReasonWriter::new(),
        run_infos: RunInfoWriter::new(),
    }
}

impl DictionaryWriters {
    /// Snapshot of all dictionary contents, written as the reads table's
    /// dictionary frame
    pub fn to_frame(&self) -> DictionaryFrame {
        DictionaryFrame {
            pores: self.pores.entries().to_vec(),
            calibrations: self.calibrations.entries().to_vec(),
            end_reasons: self.end_reasons.entries().to_vec(),
            run_infos: self.run_infos.entries().to_vec(),
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryFrame {
    pub pores: Vec<PoreData>,
    pub calibrations: Vec<CalibrationData>,
    pub end_reasons: Vec<EndReasonData>,
    pub run_infos: Vec<RunInfoData>,
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_entries_share_an_index() {
        let mut writer = PoreWriter::new();
        let a = PoreData {
            channel: 12,
            well: 1,
            pore_type: "not_set".to_string(),
        };
        let b = PoreData {
            channel: 13,
            well: 1,
            pore_type: "not_set".to_string(),
        };

        assert_eq!(writer.add(&a), 0);
        assert_eq!(writer.add(&b), 1);
        assert_eq!(writer.add(&a), 0);
        assert_eq!(writer.len(), 2);
        assert_eq!(writer.entries()[1], b);
    }
}
