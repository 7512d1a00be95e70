//! Write-through persistence into a sled database.
//!
//! Everything lives in the default tree under three key prefixes:
//! `request/<id>`, `purchase/<id>` and `journal/<seq>`. Values are CBOR.
//! Journal values carry the sha256 digest of the entry's encoding and are
//! checked against it when loaded.
use crate::error::{EngineError, Result};
use crate::journal::{Journal, JournalEntry};
use crate::purchase::Purchase;
use crate::request::ResourceRequest;
use crate::store::{PurchaseStore, RequestStore};
use sled::{Batch, Db};

const REQUEST_PREFIX: &str = "request/";
const PURCHASE_PREFIX: &str = "purchase/";
const JOURNAL_PREFIX: &str = "journal/";

#[derive(minicbor::Encode, minicbor::Decode, Debug)]
struct SealedEntry {
    #[n(0)]
    digest: String,
    #[n(1)]
    body: Vec<u8>,
}

fn request_key(id: &str) -> String {
    format!("{REQUEST_PREFIX}{id}")
}

fn purchase_key(id: &str) -> String {
    format!("{PURCHASE_PREFIX}{id}")
}

// zero padded so keys sort in sequence order
fn journal_key(seq: u64) -> String {
    format!("{JOURNAL_PREFIX}{seq:020}")
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>> {
    minicbor::to_vec(value).map_err(|e| EngineError::Codec(e.to_string()))
}

fn decode<'b, T: minicbor::Decode<'b, ()>>(bytes: &'b [u8], key: &[u8]) -> Result<T> {
    minicbor::decode(bytes).map_err(|e| {
        EngineError::Codec(format!(
            "failed to decode {}: {}",
            String::from_utf8_lossy(key),
            e
        ))
    })
}

/// Collects the entities and journal entries touched by one mutation so they
/// land in a single atomic batch.
#[derive(Default)]
pub(crate) struct WriteSet {
    batch: Batch,
    writes: usize,
}

impl WriteSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn request(&mut self, request: &ResourceRequest) -> Result<&mut Self> {
        self.batch
            .insert(request_key(request.id()).as_bytes(), encode(request)?);
        self.writes += 1;
        Ok(self)
    }

    pub(crate) fn purchase(&mut self, purchase: &Purchase) -> Result<&mut Self> {
        self.batch
            .insert(purchase_key(purchase.id()).as_bytes(), encode(purchase)?);
        self.writes += 1;
        Ok(self)
    }

    pub(crate) fn journal(&mut self, entries: &[JournalEntry]) -> Result<&mut Self> {
        for entry in entries {
            let (digest, body) = entry.build()?;
            self.batch.insert(
                journal_key(entry.seq).as_bytes(),
                encode(&SealedEntry { digest, body })?,
            );
            self.writes += 1;
        }
        Ok(self)
    }

    pub(crate) fn apply(self, db: &Db) -> Result<()> {
        if self.writes == 0 {
            return Ok(());
        }
        db.apply_batch(self.batch)?;
        tracing::debug!(writes = self.writes, "persisted batch");
        Ok(())
    }
}

/// Reads back everything previously written by [`WriteSet`].
pub(crate) fn load(db: &Db) -> Result<(RequestStore, PurchaseStore, Journal)> {
    let mut requests = RequestStore::new();
    let mut pending_requests = Vec::new();
    for item in db.scan_prefix(REQUEST_PREFIX) {
        let (key, value) = item?;
        let request: ResourceRequest = decode(&value, &key)?;
        pending_requests.push(request);
    }
    // restore creation order
    pending_requests.sort_by_key(|r| r.created_at());
    for request in pending_requests {
        requests.insert(request);
    }

    let mut purchases = PurchaseStore::new();
    let mut pending_purchases = Vec::new();
    for item in db.scan_prefix(PURCHASE_PREFIX) {
        let (key, value) = item?;
        let purchase: Purchase = decode(&value, &key)?;
        pending_purchases.push(purchase);
    }
    pending_purchases.sort_by_key(|p| p.created_at());
    for purchase in pending_purchases {
        purchases.insert(purchase);
    }

    let mut entries = Vec::new();
    for item in db.scan_prefix(JOURNAL_PREFIX) {
        let (key, value) = item?;
        let sealed: SealedEntry = decode(&value, &key)?;
        if sha256::digest(&sealed.body) != sealed.digest {
            return Err(EngineError::Codec(format!(
                "{} failed its digest check",
                String::from_utf8_lossy(&key)
            )));
        }
        let entry: JournalEntry = decode(&sealed.body, &key)?;
        entries.push(entry);
    }

    Ok((requests, purchases, Journal::from_entries(entries)))
}
