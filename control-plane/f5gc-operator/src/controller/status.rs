use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use serde_json::{Value, json};
use tracing::trace;

use crate::crd::free5gc::{
    ComponentPhase, ComponentStatus, Condition, ConditionStatus, ConditionType,
    Free5GCStatus,
};
use crate::store::{ObjectKey, ResourceStore, StoreError};
use crate::templates::{Component, WorkloadDescriptor};

/// Replica counters folded across every workload sharing a status key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Tally {
    ready: i32,
    total: i32,
    /// false once any contributing workload had no status block yet
    known: bool,
}

impl Tally {
    fn add(&mut self, dep: &Deployment) {
        match dep.status.as_ref() {
            Some(st) => {
                self.ready += st.ready_replicas.unwrap_or(0);
                self.total += st.replicas.unwrap_or(0);
            }
            None => {
                self.known = false;
                self.total += dep.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
            }
        }
    }

    fn into_status(self) -> ComponentStatus {
        if self.known && self.total > 0 && self.ready == self.total {
            ComponentStatus {
                phase: ComponentPhase::Running,
                message: None,
                ready_replicas: self.ready,
                replicas: self.total,
            }
        } else {
            ComponentStatus {
                phase: ComponentPhase::Pending,
                message: Some(format!(
                    "Waiting for {}/{} replicas to be ready",
                    self.ready, self.total
                )),
                ready_replicas: self.ready,
                replicas: self.total,
            }
        }
    }
}

/// Live readiness of the applied workloads, keyed the way status reports it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observed {
    pub database: Option<ComponentStatus>,
    pub components: BTreeMap<String, ComponentStatus>,
}

impl Observed {
    pub fn any_pending(&self) -> bool {
        self.database
            .iter()
            .chain(self.components.values())
            .any(|c| c.phase == ComponentPhase::Pending)
    }

    fn pending_names(&self) -> Vec<&str> {
        let db = self
            .database
            .as_ref()
            .filter(|c| c.phase == ComponentPhase::Pending)
            .map(|_| Component::Database.as_str());
        db.into_iter()
            .chain(
                self.components
                    .iter()
                    .filter(|(_, c)| c.phase == ComponentPhase::Pending)
                    .map(|(k, _)| k.as_str()),
            )
            .collect()
    }
}

/// Read every descriptor's Deployment and fold the counters. Workloads that
/// do not exist (yet) are skipped.
pub async fn observe<S: ResourceStore>(
    store: &S,
    namespace: &str,
    descriptors: &[WorkloadDescriptor],
) -> Result<Observed, StoreError> {
    let mut tallies: BTreeMap<Component, Tally> = BTreeMap::new();
    for desc in descriptors {
        let key = ObjectKey::new(namespace, desc.name());
        let Some(dep) = store.get::<Deployment>(&key).await? else {
            trace!(name = %key.name, "workload not found; skipping status");
            continue;
        };
        tallies
            .entry(desc.component)
            .or_insert(Tally {
                known: true,
                ..Default::default()
            })
            .add(&dep);
    }

    let mut observed = Observed::default();
    for (component, tally) in tallies {
        let status = tally.into_status();
        if component == Component::Database {
            observed.database = Some(status);
        } else {
            observed.components.insert(component.to_string(), status);
        }
    }
    Ok(observed)
}

fn condition(
    type_: ConditionType,
    status: ConditionStatus,
    reason: &str,
    message: String,
    previous: &[Condition],
    now: &str,
) -> Condition {
    // keep the transition time while the condition holds its value
    let last_transition_time = previous
        .iter()
        .find(|c| c.type_ == type_ && c.status == status)
        .and_then(|c| c.last_transition_time.clone())
        .or_else(|| Some(now.to_string()));
    Condition {
        type_,
        status,
        reason: Some(reason.to_string()),
        message: Some(message),
        last_transition_time,
    }
}

/// Assemble the next status from what was observed, carrying condition
/// transition times over from `previous`.
pub fn build_status(
    previous: Option<&Free5GCStatus>,
    observed: Observed,
    generation: Option<i64>,
    now: &str,
) -> Free5GCStatus {
    let prev_conditions = previous.map(|p| p.conditions.as_slice()).unwrap_or(&[]);
    let pending = observed.pending_names();
    let conditions = if pending.is_empty() {
        vec![
            condition(
                ConditionType::Ready,
                ConditionStatus::True,
                "AllComponentsRunning",
                "All components are running".to_string(),
                prev_conditions,
                now,
            ),
            condition(
                ConditionType::Progressing,
                ConditionStatus::False,
                "Converged",
                "Desired state reached".to_string(),
                prev_conditions,
                now,
            ),
        ]
    } else {
        let msg = format!("Waiting for {}", pending.join(", "));
        vec![
            condition(
                ConditionType::Ready,
                ConditionStatus::False,
                "ComponentsPending",
                msg.clone(),
                prev_conditions,
                now,
            ),
            condition(
                ConditionType::Progressing,
                ConditionStatus::True,
                "ComponentsPending",
                msg,
                prev_conditions,
                now,
            ),
        ]
    };

    Free5GCStatus {
        conditions,
        database: observed.database,
        components: observed.components,
        observed_generation: generation,
    }
}

/// Null out every key present in `prev` but gone from `next` so a merge
/// patch removes it instead of leaving it behind.
fn null_removed(prev: &Value, next: &mut Value) {
    let (Value::Object(prev), Value::Object(next)) = (prev, next) else {
        return;
    };
    for (k, old) in prev {
        match next.get_mut(k) {
            None => {
                next.insert(k.clone(), Value::Null);
            }
            Some(new) => null_removed(old, new),
        }
    }
}

/// Merge patch body for the status subresource, or `None` when nothing
/// changed.
pub fn status_patch(
    previous: Option<&Free5GCStatus>,
    next: &Free5GCStatus,
) -> Result<Option<Value>, serde_json::Error> {
    if previous == Some(next) {
        return Ok(None);
    }
    let mut body = serde_json::to_value(next)?;
    if let Some(prev) = previous {
        null_removed(&serde_json::to_value(prev)?, &mut body);
    }
    Ok(Some(json!({ "status": body })))
}
