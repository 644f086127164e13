pub mod audit;
pub mod cluster;
pub mod decision;
pub mod record;

pub use audit::{AuditEntry, DocumentChange, OperationKind};
pub use cluster::{Cluster, ClusterMethod, ScoredEdge};
pub use decision::{Action, Resolution, ResolveContext, Strategy};
pub use record::QaRecord;
