//! Connect, disconnect, forget and radio toggles.
//!
//! Every gateway error ends up as a failed [`Outcome`]; nothing here returns
//! an error to the caller.

use log::{debug, info, warn};

use crate::api::models::{OperationKind, OperationPhase, OperationRequest, Outcome, Subsystem};
use crate::core::delivery::DeliverySender;
use crate::core::scheduler::Backend;
use crate::core::state_cache::StateCache;
use crate::core::tokens::OperationToken;
use crate::gateway::ResolvedTarget;
use crate::Result;

/// Everything one operation needs, borrowed from the scheduler's task.
pub(crate) struct ExecContext<'a> {
    pub backend: &'a Backend,
    pub cache: &'a StateCache,
    pub deliveries: &'a DeliverySender,
    pub token: &'a OperationToken,
}

/// The terminal outcome plus whether the subsystem should be rescanned.
#[derive(Debug)]
pub(crate) struct Execution {
    pub outcome: Outcome,
    pub refresh: bool,
}

impl Execution {
    fn finished(outcome: Outcome) -> Self {
        Self {
            outcome,
            refresh: true,
        }
    }
}

/// Runs `request` to completion.
pub(crate) async fn execute(ctx: &ExecContext<'_>, request: &OperationRequest) -> Execution {
    debug!(
        "Executing {} on {} '{}'",
        request.kind, request.subsystem, request.identifier
    );

    match request.kind {
        OperationKind::Connect => connect(ctx, request).await,
        OperationKind::Disconnect => disconnect(ctx, request).await,
        OperationKind::Forget => forget(ctx, request).await,
        OperationKind::Enable => set_radio(ctx, request, true).await,
        OperationKind::Disable => set_radio(ctx, request, false).await,
    }
}

async fn connect(ctx: &ExecContext<'_>, request: &OperationRequest) -> Execution {
    let cached = ctx.cache.find(request.subsystem, &request.identifier);

    if cached.as_ref().is_some_and(|d| d.connected) {
        info!("'{}' is already connected", request.identifier);
        return Execution {
            outcome: Outcome::new(request, true),
            refresh: false,
        };
    }

    let Some(target) = resolve(ctx, request).await else {
        return Execution::finished(Outcome::new(request, false));
    };

    ctx.token.advance(OperationPhase::Acting);
    let gateway = &ctx.backend.gateway;

    let outcome = match request.secret() {
        Some(secret) => {
            let result = gateway.connect(&target, Some(secret)).await;
            conclude(request, result)
        }
        None => {
            let result = gateway.connect(&target, None).await;
            let mut outcome = conclude(request, result);
            let secured = cached.as_ref().is_some_and(|d| d.secured_or_paired);
            outcome.needs_credentials =
                !outcome.success && secured && request.subsystem == Subsystem::Wifi;
            outcome
        }
    };

    if outcome.needs_credentials {
        info!(
            "'{}' refused a connection without credentials",
            request.identifier
        );
    }
    Execution::finished(outcome)
}

async fn disconnect(ctx: &ExecContext<'_>, request: &OperationRequest) -> Execution {
    let Some(target) = resolve(ctx, request).await else {
        return Execution::finished(Outcome::new(request, false));
    };

    ctx.token.advance(OperationPhase::Acting);
    let result = ctx.backend.gateway.disconnect(&target).await;
    Execution::finished(conclude(request, result))
}

async fn forget(ctx: &ExecContext<'_>, request: &OperationRequest) -> Execution {
    let gateway = &ctx.backend.gateway;

    let result = match resolve(ctx, request).await {
        Some(target) => {
            ctx.token.advance(OperationPhase::Acting);
            if let Err(e) = gateway.disconnect(&target).await {
                debug!("Disconnect before forget failed (ignored): {e}");
            }
            gateway.remove_association(&target).await
        }
        None => {
            // Saved profiles may outlive visibility; fall back to their name.
            let name = ctx
                .cache
                .find(request.subsystem, &request.identifier)
                .map(|d| d.display_name)
                .unwrap_or_else(|| request.identifier.clone());
            warn!("Forgetting '{}' by name '{name}'", request.identifier);
            ctx.token.advance(OperationPhase::Acting);
            gateway.remove_by_name(&name).await
        }
    };

    Execution::finished(conclude(request, result))
}

async fn set_radio(ctx: &ExecContext<'_>, request: &OperationRequest, enabled: bool) -> Execution {
    ctx.token.advance(OperationPhase::Acting);

    let result = ctx.backend.gateway.set_radio_enabled(enabled).await;
    if result.is_ok() {
        ctx.cache
            .set_radio_enabled(request.subsystem, enabled, ctx.deliveries);
        info!(
            "{} radio {}",
            request.subsystem,
            if enabled { "enabled" } else { "disabled" }
        );
    }
    Execution::finished(conclude(request, result))
}

async fn resolve(ctx: &ExecContext<'_>, request: &OperationRequest) -> Option<ResolvedTarget> {
    ctx.token.advance(OperationPhase::Resolving);

    let target = ctx
        .backend
        .resolver
        .resolve(ctx.backend.gateway.as_ref(), &request.identifier)
        .await;
    if target.is_none() {
        warn!(
            "Could not resolve {} '{}'",
            request.subsystem, request.identifier
        );
    }
    target
}

fn conclude(request: &OperationRequest, result: Result<()>) -> Outcome {
    match result {
        Ok(()) => Outcome::new(request, true),
        Err(e) => {
            warn!(
                "{} of {} '{}' failed: {e}",
                request.kind, request.subsystem, request.identifier
            );
            Outcome::new(request, false)
        }
    }
}
