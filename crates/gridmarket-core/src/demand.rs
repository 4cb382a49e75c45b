//! Demand requests and the queue they wait in until a clearing run.
//!
//! A request is either pinned to one cluster or floating across all of
//! them. The queue hands out ids, keeps submission order, and is drained
//! by [`DemandQueue::take`] so a request can only ever be cleared once.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DemandError, DemandResult};
use crate::types::{ClusterId, RequestId, ShapeCatalog, WorkloadShape};

/// A request bound to one cluster. Never redirected elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PinnedRequest {
    pub id: RequestId,
    pub cluster: ClusterId,
    pub shape: WorkloadShape,
    pub quantity: u32,
}

impl PinnedRequest {
    pub fn new(
        id: RequestId,
        cluster: impl Into<ClusterId>,
        shape: WorkloadShape,
        quantity: u32,
    ) -> DemandResult<Self> {
        let cluster = cluster.into();
        if cluster.trim().is_empty() {
            return Err(DemandError::MissingCluster(id));
        }
        check_quantity_and_shape(id, &shape, quantity)?;
        Ok(Self {
            id,
            cluster,
            shape,
            quantity,
        })
    }

    pub fn gpus(&self) -> u64 {
        u64::from(self.shape.gpus) * u64::from(self.quantity)
    }
}

/// A request that may land on whichever cluster is cheapest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloatingRequest {
    pub id: RequestId,
    pub shape: WorkloadShape,
    pub quantity: u32,
}

impl FloatingRequest {
    pub fn new(id: RequestId, shape: WorkloadShape, quantity: u32) -> DemandResult<Self> {
        check_quantity_and_shape(id, &shape, quantity)?;
        Ok(Self {
            id,
            shape,
            quantity,
        })
    }

    pub fn gpus(&self) -> u64 {
        u64::from(self.shape.gpus) * u64::from(self.quantity)
    }
}

fn check_quantity_and_shape(id: RequestId, shape: &WorkloadShape, quantity: u32) -> DemandResult<()> {
    if quantity == 0 {
        return Err(DemandError::ZeroQuantity(id));
    }
    if shape.gpus == 0 {
        return Err(DemandError::ZeroGpuShape {
            id,
            shape: shape.name.clone(),
        });
    }
    Ok(())
}

/// Either class of demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum DemandRequest {
    Pinned(PinnedRequest),
    Floating(FloatingRequest),
}

impl DemandRequest {
    pub fn id(&self) -> RequestId {
        match self {
            DemandRequest::Pinned(r) => r.id,
            DemandRequest::Floating(r) => r.id,
        }
    }

    pub fn shape(&self) -> &WorkloadShape {
        match self {
            DemandRequest::Pinned(r) => &r.shape,
            DemandRequest::Floating(r) => &r.shape,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            DemandRequest::Pinned(r) => r.quantity,
            DemandRequest::Floating(r) => r.quantity,
        }
    }
}

/// The requests consumed by one clearing run, split by class.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DemandBatch {
    pub pinned: Vec<PinnedRequest>,
    pub floating: Vec<FloatingRequest>,
}

impl DemandBatch {
    pub fn len(&self) -> usize {
        self.pinned.len() + self.floating.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty() && self.floating.is_empty()
    }

    /// Total GPUs asked for across both classes.
    pub fn requested_gpus(&self) -> u64 {
        self.pinned.iter().map(PinnedRequest::gpus).sum::<u64>()
            + self.floating.iter().map(FloatingRequest::gpus).sum::<u64>()
    }
}

/// Ordered demand waiting for the next clearing run.
///
/// Ids are unique for the lifetime of the queue, across drains.
#[derive(Debug, Clone)]
pub struct DemandQueue {
    next_id: RequestId,
    ids: HashSet<RequestId>,
    batch: DemandBatch,
}

impl DemandQueue {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ids: HashSet::new(),
            batch: DemandBatch::default(),
        }
    }

    /// Queue a pinned request and return its assigned id.
    pub fn submit_pinned(
        &mut self,
        cluster: impl Into<ClusterId>,
        shape: WorkloadShape,
        quantity: u32,
    ) -> DemandResult<RequestId> {
        let id = self.next_id;
        self.push(DemandRequest::Pinned(PinnedRequest::new(id, cluster, shape, quantity)?))?;
        Ok(id)
    }

    /// Queue a floating request and return its assigned id.
    pub fn submit_floating(&mut self, shape: WorkloadShape, quantity: u32) -> DemandResult<RequestId> {
        let id = self.next_id;
        self.push(DemandRequest::Floating(FloatingRequest::new(id, shape, quantity)?))?;
        Ok(id)
    }

    /// Queue a request that already carries an id.
    pub fn push(&mut self, request: DemandRequest) -> DemandResult<()> {
        let id = request.id();
        let after = id.checked_add(1).ok_or(DemandError::IdOutOfRange(id))?;
        if !self.ids.insert(id) {
            return Err(DemandError::DuplicateId(id));
        }
        self.next_id = self.next_id.max(after);
        match request {
            DemandRequest::Pinned(r) => self.batch.pinned.push(r),
            DemandRequest::Floating(r) => self.batch.floating.push(r),
        }
        Ok(())
    }

    pub fn pinned(&self) -> &[PinnedRequest] {
        &self.batch.pinned
    }

    pub fn floating(&self) -> &[FloatingRequest] {
        &self.batch.floating
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Drain everything queued so far. The id counter keeps running.
    pub fn take(&mut self) -> DemandBatch {
        std::mem::take(&mut self.batch)
    }
}

impl Default for DemandQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Demand files ──────────────────────────────────────────────────

/// Demand as written in a `.toml` or `.json` file, shapes by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DemandFile {
    #[serde(default)]
    pub pinned: Vec<PinnedEntry>,
    #[serde(default)]
    pub floating: Vec<FloatingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PinnedEntry {
    pub id: Option<RequestId>,
    pub cluster: ClusterId,
    pub shape: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloatingEntry {
    pub id: Option<RequestId>,
    pub shape: String,
    pub quantity: u32,
}

impl DemandFile {
    /// Load a demand file, picking the parser from the extension.
    pub fn from_file(path: &Path) -> DemandResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DemandError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(DemandError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    pub fn from_toml_str(content: &str) -> DemandResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> DemandResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Resolve shapes against `catalog` and queue every entry, pinned first.
    ///
    /// All or nothing: if any entry is rejected, `queue` is left as it was.
    pub fn enqueue(&self, catalog: &ShapeCatalog, queue: &mut DemandQueue) -> DemandResult<()> {
        let mut staged = queue.clone();
        self.enqueue_into(catalog, &mut staged)?;
        *queue = staged;
        Ok(())
    }

    fn enqueue_into(&self, catalog: &ShapeCatalog, queue: &mut DemandQueue) -> DemandResult<()> {
        for entry in &self.pinned {
            let shape = resolve_shape(catalog, &entry.shape)?;
            match entry.id {
                Some(id) => queue.push(DemandRequest::Pinned(PinnedRequest::new(
                    id,
                    entry.cluster.clone(),
                    shape,
                    entry.quantity,
                )?))?,
                None => {
                    queue.submit_pinned(entry.cluster.clone(), shape, entry.quantity)?;
                }
            }
        }
        for entry in &self.floating {
            let shape = resolve_shape(catalog, &entry.shape)?;
            match entry.id {
                Some(id) => queue.push(DemandRequest::Floating(FloatingRequest::new(
                    id,
                    shape,
                    entry.quantity,
                )?))?,
                None => {
                    queue.submit_floating(shape, entry.quantity)?;
                }
            }
        }
        Ok(())
    }
}

fn resolve_shape(catalog: &ShapeCatalog, name: &str) -> DemandResult<WorkloadShape> {
    catalog
        .get(name)
        .cloned()
        .ok_or_else(|| DemandError::UnknownShape(name.to_string()))
}
