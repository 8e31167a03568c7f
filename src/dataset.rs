//! Typed datasets on top of [`StoreProvider`]
//!
//! A [`Dataset`] declares its store name and field list up front and converts
//! itself to and from a [`Record`]. [`DatasetController`] saves, deletes, and
//! loads datasets through a provider.

use crate::error::{RecordStoreError, Result};
use crate::record::Record;
use crate::store::StoreProvider;
use crate::types::Value;

/// A record type with a statically declared field list
///
/// The first entry of `FIELDS` becomes the primary column when the store is
/// created.
pub trait Dataset: Sized {
    /// Name of the store holding this dataset
    const STORE: &'static str;

    /// Field names, primary first
    const FIELDS: &'static [&'static str];

    fn to_record(&self) -> Record;

    fn from_record(record: &Record) -> Result<Self>;
}

/// Reorder a record's fields to the dataset's declared order
///
/// Fields not in `FIELDS` keep their relative order after the declared ones.
pub fn ordered_record<D: Dataset>(dataset: &D) -> Record {
    let mut source = dataset.to_record();
    let mut record = Record::new();
    for field in D::FIELDS {
        if let Some(value) = source.remove(field) {
            record.insert(*field, value);
        }
    }
    for (field, value) in source {
        record.insert(field, value);
    }
    record
}

/// Saves, deletes, and loads [`Dataset`]s
pub struct DatasetController<'a> {
    provider: &'a StoreProvider,
}

impl<'a> DatasetController<'a> {
    pub fn new(provider: &'a StoreProvider) -> Self {
        Self { provider }
    }

    pub async fn save_dataset<D: Dataset>(&self, dataset: &D) -> Result<()> {
        let record = ordered_record(dataset);
        self.provider.save(D::STORE, &record).await
    }

    pub async fn delete_dataset<D: Dataset>(&self, dataset: &D) -> Result<()> {
        let mut record = ordered_record(dataset);
        self.provider.delete(D::STORE, &mut record).await
    }

    /// Every dataset in the store
    pub async fn get_datasets<D: Dataset>(&self) -> Result<Vec<D>> {
        self.provider
            .get_all(D::STORE, &[])
            .await?
            .iter()
            .map(D::from_record)
            .collect()
    }

    /// First dataset whose `column` equals `value`
    ///
    /// `None` when nothing matches or the store does not exist yet.
    pub async fn get_dataset<D: Dataset>(
        &self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Option<D>> {
        match self.provider.single(D::STORE, column, value).await {
            Ok(Some(record)) => D::from_record(&record).map(Some),
            Ok(None) | Err(RecordStoreError::StoreNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
