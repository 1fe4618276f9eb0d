//! Policy decision engine: role/resource/action evaluation.

use crate::policy::RolePolicy;
use crate::types::{
    DecisionResult, DenyReason, LogicalAction, Principal, RequestDescriptor,
};

pub struct DecisionEngine;

impl DecisionEngine {
    /// Evaluate a request against a role's policy. Pure function of its
    /// inputs: no side effects, no interior state.
    ///
    /// An absent `role_policy` (unknown role) denies before any resource
    /// lookup. A path with no non-empty segment has no resource and is
    /// denied the same way as an unlisted one.
    pub fn evaluate(
        _principal: &Principal,
        request: &RequestDescriptor,
        role_policy: Option<&RolePolicy>,
    ) -> DecisionResult {
        let Some(policy) = role_policy else {
            return DecisionResult::deny(DenyReason::RoleNotFound);
        };

        let Some(resource) = request.resource() else {
            return DecisionResult::deny(DenyReason::NoResourcePermission);
        };
        let Some(resource_policy) = policy.resources.get(resource) else {
            return DecisionResult::deny(DenyReason::NoResourcePermission);
        };

        let action = LogicalAction::from_method(&request.method);
        if !resource_policy.actions.iter().any(|a| action.permits(*a)) {
            return DecisionResult::deny(DenyReason::ActionNotAllowed);
        }

        DecisionResult::allow(request.payload.clone())
    }
}
