//! Effect interpreter that executes effects against the messenger and the
//! sabotage engine.
//!
//! The interpreter is the boundary between the pure state machine and the
//! impure world of I/O. It takes effects (descriptions of what to do) and
//! executes them, returning result events.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use saboteur_core::{PlayerId, Sabotage, SabotageKind};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::effect::{Effect, LogLevel};
use super::event::Event;
use crate::ids::{LobbyCode, SessionId};
use crate::messenger::{Keyboard, MessageRef, Messenger};
use crate::sabotage_engine::{SabotageEngine, TimeoutCallback};
use crate::scheduler::Scheduler;

/// A critical sabotage that ran out of time, addressed to its session.
#[derive(Debug, Clone)]
pub struct SabotageTimeout {
    pub session: SessionId,
    pub sabotage: Sabotage,
}

/// Context needed by the interpreter to execute effects.
pub struct InterpreterContext {
    pub session: SessionId,
    pub code: LobbyCode,
    pub messenger: Arc<dyn Messenger>,
    pub sabotage: Arc<SabotageEngine>,
    pub scheduler: Arc<dyn Scheduler>,
    /// Where expired critical sabotages are reported.
    pub timeouts: UnboundedSender<SabotageTimeout>,
    pub now: DateTime<Utc>,
    /// Correlation ID for request tracing.
    pub correlation_id: Option<String>,
}

/// Result of executing an effect.
#[derive(Debug)]
pub enum EffectResult {
    /// Effect completed, produced result events.
    Ok(Vec<Event>),
    /// Effect failed with an error.
    Err(String),
}

impl EffectResult {
    pub fn single(event: Event) -> Self {
        Self::Ok(vec![event])
    }

    pub fn none() -> Self {
        Self::Ok(vec![])
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self::Err(msg.into())
    }
}

/// Execute a list of effects and collect result events.
///
/// Effects are executed sequentially. If an effect fails, execution continues
/// with remaining effects, and the error is logged.
pub async fn execute_effects(ctx: &InterpreterContext, effects: Vec<Effect>) -> Vec<Event> {
    let mut result_events = Vec::new();

    for effect in effects {
        match execute_effect(ctx, effect).await {
            EffectResult::Ok(events) => result_events.extend(events),
            EffectResult::Err(err) => {
                error!(
                    correlation_id = ctx.correlation_id.as_deref().unwrap_or("-"),
                    "Effect execution failed in lobby {}: {}", ctx.code, err
                );
            }
        }
    }

    result_events
}

/// Execute a single effect.
async fn execute_effect(ctx: &InterpreterContext, effect: Effect) -> EffectResult {
    match effect {
        Effect::Send {
            player,
            text,
            keyboard,
        } => execute_send(ctx, player, &text, keyboard.as_ref()).await,

        Effect::SendEphemeral { player, text, ttl } => {
            execute_send_ephemeral(ctx, player, &text, ttl).await
        }

        Effect::Edit {
            player,
            message,
            text,
            keyboard,
        } => execute_edit(ctx, player, message, &text, keyboard.as_ref()).await,

        Effect::InitiateSabotage { kind, initiator } => {
            execute_initiate_sabotage(ctx, kind, initiator).await
        }

        Effect::AttemptSabotageFix { player } => {
            let outcome = ctx.sabotage.attempt_fix(ctx.session, player, ctx.now).await;
            EffectResult::single(Event::SabotageFixRecorded { player, outcome })
        }

        Effect::CancelSabotage => {
            if let Some(sabotage) = ctx.sabotage.cancel(ctx.session).await {
                debug!("Cancelled {} in lobby {}", sabotage.kind, ctx.code);
            }
            EffectResult::none()
        }

        Effect::Log { level, message } => {
            match level {
                LogLevel::Debug => debug!("{}", message),
                LogLevel::Info => info!("{}", message),
                LogLevel::Warn => warn!("{}", message),
                LogLevel::Error => error!("{}", message),
            }
            EffectResult::none()
        }
    }
}

async fn execute_send(
    ctx: &InterpreterContext,
    player: PlayerId,
    text: &str,
    keyboard: Option<&Keyboard>,
) -> EffectResult {
    match ctx.messenger.send_to_player(player, text, keyboard).await {
        Ok(_) => EffectResult::none(),
        Err(e) => EffectResult::err(format!("Failed to send to player {}: {}", player, e)),
    }
}

/// Sends a message and schedules its deletion after `ttl`.
async fn execute_send_ephemeral(
    ctx: &InterpreterContext,
    player: PlayerId,
    text: &str,
    ttl: Duration,
) -> EffectResult {
    let message = match ctx.messenger.send_to_player(player, text, None).await {
        Ok(message) => message,
        Err(e) => {
            return EffectResult::err(format!("Failed to send to player {}: {}", player, e));
        }
    };

    let messenger = Arc::clone(&ctx.messenger);
    // Deletion outlives this event, so the handle is not kept.
    let _ = ctx.scheduler.after(
        ttl,
        Box::pin(async move {
            delete_quietly(messenger, player, message).await;
        }),
    );
    EffectResult::none()
}

async fn delete_quietly(messenger: Arc<dyn Messenger>, player: PlayerId, message: MessageRef) {
    if let Err(e) = messenger.delete_message(player, message).await {
        debug!("Could not delete ephemeral message: {}", e);
    }
}

async fn execute_edit(
    ctx: &InterpreterContext,
    player: PlayerId,
    message: MessageRef,
    text: &str,
    keyboard: Option<&Keyboard>,
) -> EffectResult {
    match ctx.messenger.edit_message(player, message, text, keyboard).await {
        Ok(()) => EffectResult::none(),
        Err(e) => {
            // The message may be gone; fall back to a fresh one.
            warn!("Edit failed for player {}, sending instead: {}", player, e);
            execute_send(ctx, player, text, keyboard).await
        }
    }
}

async fn execute_initiate_sabotage(
    ctx: &InterpreterContext,
    kind: SabotageKind,
    initiator: PlayerId,
) -> EffectResult {
    let on_timeout = kind.is_critical().then(|| timeout_reporter(ctx));
    match ctx
        .sabotage
        .initiate(ctx.session, kind, initiator, ctx.now, on_timeout)
        .await
    {
        Some(sabotage) => EffectResult::single(Event::SabotageStarted { sabotage }),
        None => EffectResult::single(Event::SabotageRejected { initiator, kind }),
    }
}

/// Callback that forwards an expired sabotage to the store's listener.
fn timeout_reporter(ctx: &InterpreterContext) -> TimeoutCallback {
    let session = ctx.session;
    let timeouts = ctx.timeouts.clone();
    Box::new(move |sabotage| {
        Box::pin(async move {
            if timeouts.send(SabotageTimeout { session, sabotage }).is_err() {
                warn!("Sabotage timeout for {} dropped: store is gone", session);
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::OutboxMessenger;
    use crate::sabotage_engine::FixOutcome;
    use crate::scheduler::TokioScheduler;
    use tokio::sync::mpsc;

    struct Harness {
        ctx: InterpreterContext,
        outbox: Arc<OutboxMessenger>,
        timeouts: mpsc::UnboundedReceiver<SabotageTimeout>,
    }

    fn harness() -> Harness {
        let outbox = Arc::new(OutboxMessenger::new());
        let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler);
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = InterpreterContext {
            session: SessionId(7),
            code: LobbyCode::from("ABCDE"),
            messenger: outbox.clone(),
            sabotage: Arc::new(SabotageEngine::new(
                Arc::clone(&scheduler),
                Duration::from_secs(60),
                2,
            )),
            scheduler,
            timeouts: tx,
            now: Utc::now(),
            correlation_id: None,
        };
        Harness {
            ctx,
            outbox,
            timeouts: rx,
        }
    }

    #[tokio::test]
    async fn test_send_delivers_to_outbox() {
        let h = harness();
        let events = execute_effects(&h.ctx, vec![Effect::send(PlayerId(1), "hi")]).await;
        assert!(events.is_empty());
        assert_eq!(h.outbox.last_message(PlayerId(1)).await.unwrap().text, "hi");
    }

    #[tokio::test]
    async fn test_failed_edit_falls_back_to_send() {
        let h = harness();
        let effect = Effect::Edit {
            player: PlayerId(1),
            message: MessageRef(404),
            text: "panel".into(),
            keyboard: None,
        };
        execute_effects(&h.ctx, vec![effect]).await;
        let last = h.outbox.last_message(PlayerId(1)).await.unwrap();
        assert_eq!(last.text, "panel");
        assert!(!last.edited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ephemeral_message_is_deleted_after_ttl() {
        let h = harness();
        let effect = Effect::SendEphemeral {
            player: PlayerId(2),
            text: "You are a Saboteur".into(),
            ttl: Duration::from_secs(30),
        };
        execute_effects(&h.ctx, vec![effect]).await;
        assert_eq!(h.outbox.messages_for(PlayerId(2)).await.len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(h.outbox.messages_for(PlayerId(2)).await.is_empty());
    }

    #[tokio::test]
    async fn test_second_sabotage_is_rejected() {
        let h = harness();
        let start = |kind| Effect::InitiateSabotage {
            kind,
            initiator: PlayerId(3),
        };
        let events = execute_effects(
            &h.ctx,
            vec![start(SabotageKind::Lights), start(SabotageKind::Reactor)],
        )
        .await;

        assert!(matches!(&events[0], Event::SabotageStarted { sabotage } if sabotage.kind == SabotageKind::Lights));
        assert_eq!(
            events[1],
            Event::SabotageRejected {
                initiator: PlayerId(3),
                kind: SabotageKind::Reactor
            }
        );
    }

    #[tokio::test]
    async fn test_fix_reports_progress() {
        let h = harness();
        execute_effects(
            &h.ctx,
            vec![Effect::InitiateSabotage {
                kind: SabotageKind::Oxygen,
                initiator: PlayerId(3),
            }],
        )
        .await;
        let events = execute_effects(&h.ctx, vec![Effect::AttemptSabotageFix { player: PlayerId(1) }]).await;
        assert!(matches!(
            &events[0],
            Event::SabotageFixRecorded {
                outcome: FixOutcome::Progress { fixers: 1, required: 2, .. },
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_timeout_is_reported_on_channel() {
        let mut h = harness();
        execute_effects(
            &h.ctx,
            vec![Effect::InitiateSabotage {
                kind: SabotageKind::Reactor,
                initiator: PlayerId(3),
            }],
        )
        .await;

        tokio::time::sleep(Duration::from_secs(61)).await;
        let timeout = h.timeouts.recv().await.unwrap();
        assert_eq!(timeout.session, SessionId(7));
        assert_eq!(timeout.sabotage.kind, SabotageKind::Reactor);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_timeout() {
        let mut h = harness();
        execute_effects(
            &h.ctx,
            vec![
                Effect::InitiateSabotage {
                    kind: SabotageKind::Reactor,
                    initiator: PlayerId(3),
                },
                Effect::CancelSabotage,
            ],
        )
        .await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(h.timeouts.try_recv().is_err());
        assert!(!h.ctx.sabotage.is_active(SessionId(7)).await);
    }
}
