//! connect → subscribe for status → submit → await terminal status →
//! unsubscribe, once per request. A request bound to a node stays on that
//! node.

use super::{Epic, EpicContext};
use crate::atom::Atom;
use crate::error::SubmissionError;
use crate::network::actions::NodeAction;
use crate::network::atom_status::{PendingSubmission, Resolution};
use crate::network::jsonrpc::parse_status_notification;
use crate::network::node::RadixNode;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct Entry {
    atom: Atom,
    cancel: CancellationToken,
    node: Option<RadixNode>,
}

pub struct SubmitAtomEpic {
    requests: Arc<Mutex<HashMap<Uuid, Entry>>>,
}

impl SubmitAtomEpic {
    pub fn new() -> Self {
        SubmitAtomEpic {
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for SubmitAtomEpic {
    fn default() -> Self {
        Self::new()
    }
}

fn completed(uuid: Uuid, atom: Atom, node: Option<RadixNode>, result: Result<(), SubmissionError>) -> NodeAction {
    NodeAction::SubmitAtomCompleted {
        uuid,
        atom,
        node,
        result,
    }
}

/// Fails a request that found no node within the submission timeout. The
/// entry is removed first so a late `FindANodeResult` is ignored.
async fn expire_unrouted(
    uuid: Uuid,
    cancel: CancellationToken,
    requests: Arc<Mutex<HashMap<Uuid, Entry>>>,
    ctx: EpicContext,
) {
    let timeout = ctx.settings.submission_timeout;
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = ctx.cancel.cancelled() => return,
        _ = tokio::time::sleep(timeout) => {}
    }
    let expired = {
        let mut requests = requests.lock();
        match requests.get(&uuid) {
            Some(entry) if entry.node.is_none() => requests.remove(&uuid).map(|entry| entry.atom),
            _ => None,
        }
    };
    if let Some(atom) = expired {
        warn!(uuid = %uuid, atom = %atom.short_id(), "No suitable node for submission");
        ctx.dispatch(completed(
            uuid,
            atom,
            None,
            Err(SubmissionError::Transport(format!(
                "no suitable node within {timeout:?}"
            ))),
        ));
    }
}

async fn run_submission(uuid: Uuid, atom: Atom, node: RadixNode, cancel: CancellationToken, ctx: EpicContext) {
    let _lease = ctx.websockets.lease(&node);
    let result = submit_and_wait(uuid, &atom, &node, &cancel, &ctx).await;
    match &result {
        Ok(()) => info!(uuid = %uuid, atom = %atom.short_id(), node = %node, "Atom stored"),
        Err(e) => warn!(uuid = %uuid, atom = %atom.short_id(), node = %node, error = %e, "Atom submission failed"),
    }
    ctx.dispatch(completed(uuid, atom, Some(node), result));
}

async fn submit_and_wait(
    uuid: Uuid,
    atom: &Atom,
    node: &RadixNode,
    cancel: &CancellationToken,
    ctx: &EpicContext,
) -> Result<(), SubmissionError> {
    if cancel.is_cancelled() {
        return Err(SubmissionError::Cancelled);
    }
    let transport = |e: crate::error::RpcError| SubmissionError::Transport(e.to_string());
    let client = ctx.websockets.connect(node).await.map_err(transport)?;
    let subscriber_id = uuid.to_string();
    let mut pending = PendingSubmission::new(atom.hid());

    let mut statuses = client
        .observe_atom_status_notifications(&subscriber_id, atom)
        .await
        .map_err(transport)?;
    if let Err(e) = client.submit_atom(atom).await {
        client.unsubscribe_notifications(&subscriber_id);
        return Err(transport(e));
    }
    debug!(uuid = %uuid, node = %node, "Atom sent, awaiting status");

    let deadline = tokio::time::sleep(ctx.settings.submission_timeout);
    tokio::pin!(deadline);
    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Err(SubmissionError::Cancelled),
            _ = ctx.cancel.cancelled() => break Err(SubmissionError::Cancelled),
            _ = &mut deadline => {
                break Err(SubmissionError::Transport(format!(
                    "no terminal status within {:?}",
                    ctx.settings.submission_timeout
                )))
            }
            pushed = statuses.recv() => {
                let Some(params) = pushed else {
                    break Err(SubmissionError::Transport("connection closed".to_string()));
                };
                let notification = match parse_status_notification(&params) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(uuid = %uuid, error = %e, "Ignoring bad status notification");
                        continue;
                    }
                };
                ctx.dispatch(NodeAction::SubmitAtomStatus {
                    uuid,
                    atom: atom.clone(),
                    node: node.clone(),
                    status: notification.status,
                    data: notification.data.clone(),
                });
                match pending.observe(notification.status, notification.data) {
                    Ok(Resolution::Pending) => continue,
                    Ok(Resolution::Resolved(result)) => break result,
                    Err(e) => break Err(e),
                }
            }
        }
    };

    if let Err(e) = client.close_atom_status_notifications(&subscriber_id).await {
        debug!(uuid = %uuid, error = %e, "Closing status notifications failed");
    }
    outcome
}

#[async_trait]
impl Epic for SubmitAtomEpic {
    fn name(&self) -> &'static str {
        "submit-atom"
    }

    async fn handle(&self, action: &NodeAction, ctx: &EpicContext) {
        match action {
            NodeAction::SubmitAtomRequest { uuid, atom } => {
                let cancel = CancellationToken::new();
                self.requests.lock().insert(
                    *uuid,
                    Entry {
                        atom: atom.clone(),
                        cancel: cancel.clone(),
                        node: None,
                    },
                );
                tokio::spawn(expire_unrouted(*uuid, cancel, self.requests.clone(), ctx.clone()));
                ctx.dispatch(NodeAction::FindANodeRequest { uuid: *uuid });
            }
            NodeAction::FindANodeResult { uuid, node } => {
                let atom = {
                    let mut requests = self.requests.lock();
                    match requests.get_mut(uuid) {
                        Some(entry) if entry.node.is_none() => {
                            entry.node = Some(node.clone());
                            entry.atom.clone()
                        }
                        _ => return,
                    }
                };
                ctx.dispatch(NodeAction::SubmitAtomSend {
                    uuid: *uuid,
                    atom,
                    node: node.clone(),
                });
            }
            NodeAction::SubmitAtomSend { uuid, atom, node } => {
                let Some(cancel) = self.requests.lock().get(uuid).map(|e| e.cancel.clone()) else {
                    return;
                };
                tokio::spawn(run_submission(*uuid, atom.clone(), node.clone(), cancel, ctx.clone()));
            }
            NodeAction::SubmitAtomCancel { uuid } => {
                let unrouted = {
                    let mut requests = self.requests.lock();
                    let routed = match requests.get(uuid) {
                        Some(entry) => {
                            entry.cancel.cancel();
                            entry.node.is_some()
                        }
                        None => true,
                    };
                    if routed {
                        None
                    } else {
                        requests.remove(uuid).map(|entry| entry.atom)
                    }
                };
                if let Some(atom) = unrouted {
                    ctx.dispatch(completed(*uuid, atom, None, Err(SubmissionError::Cancelled)));
                }
            }
            NodeAction::SubmitAtomCompleted { uuid, .. } => {
                if let Some(entry) = self.requests.lock().remove(uuid) {
                    entry.cancel.cancel();
                }
            }
            _ => {}
        }
    }
}
