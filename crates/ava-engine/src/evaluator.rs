// crates/ava-engine/src/evaluator.rs
// ============================================================================
// Module: Session Evaluator
// Description: Ingest/flush composition root: buffers events per session,
//              resolves the scoring config and engine, runs the MSWIM
//              pipeline, and persists + broadcasts the outcome.
// ============================================================================

//! The evaluator is the one place ingestion, config resolution, the
//! generative client, the MSWIM pipeline, storage, and the broadcast hub all
//! meet. Everything it calls into is either pure (`ava_core`) or a trait
//! object, so the struct itself stays free of any concrete storage or
//! transport dependency.

use std::sync::Arc;

use ava_broker::channel::Channel;
use ava_broker::hub::BroadcastHub;
use ava_config::loader::ConfigLoader;
use ava_core::clock::Clock;
use ava_core::clock::seconds_between;
use ava_core::gates::GateContext;
use ava_core::identifiers::EvaluationId;
use ava_core::identifiers::InterventionId;
use ava_core::identifiers::ShadowComparisonId;
use ava_core::identifiers::SiteUrl;
use ava_core::model::event::TrackEvent;
use ava_core::model::evaluation::Decision;
use ava_core::model::evaluation::Evaluation;
use ava_core::model::evaluation::Tier;
use ava_core::model::experiment::EvalEngine;
use ava_core::model::experiment::Experiment;
use ava_core::model::intervention::Intervention;
use ava_core::model::intervention::InterventionStatus;
use ava_core::model::intervention::InterventionType;
use ava_core::model::session::Session;
use ava_core::model::shadow::ShadowComparison;
use ava_core::model::shadow::ShadowSide;
use ava_core::model::training_datapoint::SessionContextSnapshot;
use ava_core::mswim_engine::RawHints;
use ava_core::mswim_engine::SessionEvalContext;
use ava_core::mswim_engine::run_mswim;
use ava_core::repo::EvaluationRepo;
use ava_core::repo::InterventionRepo;
use ava_core::repo::ShadowComparisonRepo;
use ava_core::repo::SessionRepo;
use ava_core::signals::ClarityContext;
use ava_core::signals::IntentContext;
use ava_core::signals::ReceptivityContext;
use ava_core::signals::ValueContext;
use ava_core::telemetry::EvaluationCompleted;
use ava_core::telemetry::GateOverridden;
use ava_core::telemetry::GenerativeModelFallback;
use ava_core::telemetry::PersistenceRetryExhausted;
use ava_core::telemetry::Telemetry;
use ava_core::variant;
use ava_providers::client::GenerateHintsRequest;
use ava_providers::client::GenerativeModelClient;
use ava_providers::client::ProviderError;
use ava_providers::shadow::ShadowContext;
use ava_providers::shadow::synthesize_hints;
use serde_json::json;
use time::Duration;

use crate::ids::IdGenerator;
use crate::payload::build_payload;
use crate::session_buffer::SessionBuffers;
use crate::session_buffer::SessionState;

/// Number of persistence attempts before a write is dropped: one initial
/// attempt plus two retries.
const MAX_PERSIST_ATTEMPTS: u32 = 3;

/// Retries `op` up to [`MAX_PERSIST_ATTEMPTS`] times, logging
/// [`PersistenceRetryExhausted`] via `telemetry` if every attempt fails.
/// Returns `true` iff a write eventually succeeded.
async fn persist_with_retry<F, Fut, E>(
    telemetry: &dyn Telemetry,
    operation: &'static str,
    session_id: Option<ava_core::identifiers::SessionId>,
    mut op: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
{
    for _ in 0..MAX_PERSIST_ATTEMPTS {
        if op().await.is_ok() {
            return true;
        }
    }
    telemetry.persistence_retry_exhausted(PersistenceRetryExhausted { operation, session_id });
    false
}

/// Maps a provider failure to the static reason string telemetry expects.
const fn provider_error_reason(error: &ProviderError) -> &'static str {
    match error {
        ProviderError::Timeout => "timeout",
        ProviderError::Transport(_) => "transport_error",
        ProviderError::InvalidResponse(_) => "invalid_response",
    }
}

/// Builds a short free-text narrative from the buffered event window, for
/// the generative client's prompt context.
fn build_narrative(events: &std::collections::VecDeque<TrackEvent>) -> String {
    if events.is_empty() {
        return String::new();
    }
    events
        .iter()
        .map(|event| format!("{:?} on {:?}", event.event_type, event.page_type))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-session evaluation pipeline: buffers ingested events, and on flush
/// resolves config, selects an engine, runs the MSWIM pipeline, and
/// persists + broadcasts the result.
pub struct SessionEvaluator {
    /// Process-wide per-session buffer registry.
    buffers: Arc<SessionBuffers>,
    /// Cached scoring-config resolver.
    config_loader: Arc<ConfigLoader>,
    /// Session identity and counter store.
    session_repo: Arc<dyn SessionRepo>,
    /// Evaluation record store.
    evaluation_repo: Arc<dyn EvaluationRepo>,
    /// Intervention record store.
    intervention_repo: Arc<dyn InterventionRepo>,
    /// Shadow-comparison record store.
    shadow_repo: Arc<dyn ShadowComparisonRepo>,
    /// Generative-model client; absent disables the `llm`/`auto` engines.
    generative_client: Option<Arc<dyn GenerativeModelClient>>,
    /// Widget/dashboard broadcast hub.
    hub: Arc<BroadcastHub>,
    /// Typed-event telemetry sink.
    telemetry: Arc<dyn Telemetry>,
    /// Wall-clock source.
    clock: Arc<dyn Clock>,
    /// Mints [`EvaluationId`]s.
    evaluation_ids: IdGenerator,
    /// Mints [`InterventionId`]s.
    intervention_ids: IdGenerator,
    /// Mints [`ShadowComparisonId`]s.
    shadow_ids: IdGenerator,
    /// Whether shadow evaluation runs alongside production evaluation.
    shadow_enabled: bool,
    /// Engine selector used when no experiment variant overrides it.
    default_engine: EvalEngine,
    /// Context-window cap per session.
    max_context_events: usize,
    /// Flush timer interval.
    batch_interval: Duration,
    /// Event-count flush trigger.
    batch_max_events: usize,
    /// Minimum spacing between generative calls for the same session under
    /// the `auto` engine.
    generative_cooldown: Duration,
}

/// Constructor arguments for [`SessionEvaluator::new`], grouped to keep the
/// constructor's signature from growing one parameter at a time.
pub struct SessionEvaluatorDeps {
    /// Process-wide per-session buffer registry.
    pub buffers: Arc<SessionBuffers>,
    /// Cached scoring-config resolver.
    pub config_loader: Arc<ConfigLoader>,
    /// Session identity and counter store.
    pub session_repo: Arc<dyn SessionRepo>,
    /// Evaluation record store.
    pub evaluation_repo: Arc<dyn EvaluationRepo>,
    /// Intervention record store.
    pub intervention_repo: Arc<dyn InterventionRepo>,
    /// Shadow-comparison record store.
    pub shadow_repo: Arc<dyn ShadowComparisonRepo>,
    /// Generative-model client; absent disables the `llm`/`auto` engines.
    pub generative_client: Option<Arc<dyn GenerativeModelClient>>,
    /// Widget/dashboard broadcast hub.
    pub hub: Arc<BroadcastHub>,
    /// Typed-event telemetry sink.
    pub telemetry: Arc<dyn Telemetry>,
    /// Wall-clock source.
    pub clock: Arc<dyn Clock>,
    /// Whether shadow evaluation runs alongside production evaluation.
    pub shadow_enabled: bool,
    /// Engine selector used when no experiment variant overrides it.
    pub default_engine: EvalEngine,
    /// Context-window cap per session.
    pub max_context_events: usize,
    /// Flush timer interval.
    pub batch_interval: Duration,
    /// Event-count flush trigger.
    pub batch_max_events: usize,
    /// Minimum spacing between generative calls for the same session under
    /// the `auto` engine.
    pub generative_cooldown: Duration,
}

impl SessionEvaluator {
    /// Builds an evaluator from its collaborators.
    #[must_use]
    pub fn new(deps: SessionEvaluatorDeps) -> Self {
        Self {
            buffers: deps.buffers,
            config_loader: deps.config_loader,
            session_repo: deps.session_repo,
            evaluation_repo: deps.evaluation_repo,
            intervention_repo: deps.intervention_repo,
            shadow_repo: deps.shadow_repo,
            generative_client: deps.generative_client,
            hub: deps.hub,
            telemetry: deps.telemetry,
            clock: deps.clock,
            evaluation_ids: IdGenerator::new("eval"),
            intervention_ids: IdGenerator::new("iv"),
            shadow_ids: IdGenerator::new("shdw"),
            shadow_enabled: deps.shadow_enabled,
            default_engine: deps.default_engine,
            max_context_events: deps.max_context_events,
            batch_interval: deps.batch_interval,
            batch_max_events: deps.batch_max_events,
            generative_cooldown: deps.generative_cooldown,
        }
    }

    /// Ingests `event` into `session_id`'s buffer, creating the buffer (via
    /// `make_session`) if this is the session's first event, and flushes
    /// immediately if the ingest made a flush due.
    ///
    /// Raw event persistence and session upsert are the caller's
    /// responsibility; this only maintains the in-process evaluation
    /// buffer and triggers the flush side effects documented on
    /// [`Self::flush`].
    pub async fn ingest(
        &self,
        session_id: &ava_core::identifiers::SessionId,
        make_session: impl FnOnce() -> Session,
        event: TrackEvent,
        active_experiment: Option<&Experiment>,
    ) {
        let max_context_events = self.max_context_events;
        let state_lock = self
            .buffers
            .get_or_insert_with(session_id, || SessionState::new(make_session(), max_context_events));

        let now = self.clock.now();
        let flush_due = {
            let mut state = state_lock.lock().await;
            state.ingest(event);
            state.ensure_flush_scheduled(now, self.batch_interval);
            state.flush_due(now, self.batch_max_events)
        };

        if flush_due {
            self.flush(session_id, active_experiment).await;
        }
    }

    /// Flushes `session_id`'s buffer: resolves config and engine, runs the
    /// MSWIM pipeline, optionally runs a shadow comparison, persists the
    /// result, and broadcasts it. A no-op if no buffer is registered for
    /// `session_id`.
    pub async fn flush(&self, session_id: &ava_core::identifiers::SessionId, active_experiment: Option<&Experiment>) {
        let Some(state_lock) = self.buffers.get(session_id) else {
            return;
        };
        let mut state = state_lock.lock().await;
        let now = self.clock.now();

        let site_url = state.session.site_url.clone();
        let (config_id_override, engine_override) = resolve_variant_override(active_experiment, session_id);
        let config = self.config_loader.load(Some(&site_url), config_id_override.as_ref()).await;

        let engine = engine_override.unwrap_or(self.default_engine);

        let ctx = self.build_eval_context(&state, now);
        let fast_hints = synthesize_hints(&ShadowContext {
            page_type: ctx.intent.page_type,
            detected_friction_ids: ctx.detected_friction_ids.clone(),
            event_count: state.events().len(),
            session_age_sec: ctx.clarity.session_age_sec,
            cart_item_count: ctx.intent.cart_item_count,
        });

        let (hints, engine_used) = self
            .select_hints(engine, &config, &ctx, &state, fast_hints, now, session_id)
            .await;
        if engine_used == "llm" {
            state.last_generative_call_at = Some(now);
        }

        let result = run_mswim(hints, &config, &ctx);

        if let Some(gate_override) = result.gate_override {
            self.telemetry.gate_overridden(GateOverridden {
                session_id: session_id.clone(),
                rule_id: gate_override.rule_id(),
            });
        }

        let evaluation_id = EvaluationId::from(self.evaluation_ids.issue());
        self.telemetry.evaluation_completed(EvaluationCompleted {
            session_id: session_id.clone(),
            evaluation_id: evaluation_id.clone(),
            composite_score: result.composite_score,
            tier: tier_label(result.tier),
            decision: decision_label(result.decision),
        });

        let evaluation = Evaluation {
            id: evaluation_id.clone(),
            session_id: session_id.clone(),
            evaluated_at: now,
            result: result.clone(),
            engine_used: engine_used.to_owned(),
        };

        if self.shadow_enabled {
            self.run_shadow_comparison(session_id, &site_url, &config, &ctx, fast_hints, &result, now).await;
        }

        persist_with_retry(self.telemetry.as_ref(), "EvaluationRepo::create", Some(session_id.clone()), || {
            let evaluation = evaluation.clone();
            async move { self.evaluation_repo.create(evaluation).await }
        })
        .await;

        self.hub.broadcast_to_channel(
            Channel::Dashboard,
            json!({ "kind": "evaluation", "sessionId": session_id.as_str(), "evaluation": evaluation }),
        );

        match result.decision {
            Decision::Fire => {
                self.fire_intervention(session_id, &evaluation_id, &result, &mut state, now).await;
            }
            Decision::Suppress => {
                self.hub.broadcast_to_channel(
                    Channel::Dashboard,
                    json!({ "kind": "suppress_audit", "sessionId": session_id.as_str(), "evaluationId": evaluation_id.as_str(), "reasoning": result.reasoning }),
                );
            }
        }

        state.clear_after_flush();
    }

    /// Builds the full MSWIM context from a session's buffered state.
    fn build_eval_context(&self, state: &SessionState, now: time::OffsetDateTime) -> SessionEvalContext {
        let session = &state.session;
        let counters = &session.running_counters;
        let session_age_sec = session.age_seconds(now);
        let detected_friction_ids: Vec<_> = state.events().iter().filter_map(|event| event.friction_id.clone()).collect();

        SessionEvalContext {
            intent: IntentContext {
                page_type: state.events().back().map_or(ava_core::model::event::PageType::Other, |event| event.page_type),
                is_logged_in: session.is_logged_in,
                is_repeat_visitor: session.is_repeat_visitor,
                cart_value: session.cart_value,
                cart_item_count: session.cart_item_count,
            },
            detected_friction_ids: detected_friction_ids.clone(),
            clarity: ClarityContext {
                session_age_sec,
                event_count: state.events().len(),
                rule_based_corroboration: false,
            },
            receptivity: ReceptivityContext {
                total_interventions_fired: counters.total_interventions_fired,
                total_dismissals: counters.total_dismissals,
                seconds_since_last_intervention: last_intervention_seconds(counters, now),
                is_mobile: session.device_type.is_mobile(),
                widget_opened_voluntarily: counters.widget_opened_voluntarily,
                idle_seconds: counters.idle_seconds,
            },
            value: ValueContext {
                cart_value: session.cart_value,
                is_logged_in: session.is_logged_in,
                is_repeat_visitor: session.is_repeat_visitor,
                referrer_type: session.referrer_type,
            },
            gate: GateContext {
                session_age_sec,
                total_dismissals: counters.total_dismissals,
                current_friction_ids: detected_friction_ids,
                friction_ids_already_intervened: counters.friction_ids_already_intervened.clone(),
                seconds_since_last_active: counters.last_intervention_at.active.map(|at| seconds_between(at, now)),
                seconds_since_last_nudge: counters.last_intervention_at.nudge.map(|at| seconds_between(at, now)),
                total_active: counters.total_active,
                total_nudges: counters.total_nudges,
                total_non_passive: counters.total_non_passive,
                flags: counters.flags,
            },
        }
    }

    /// Selects the hint source per the engine rule and returns the static
    /// label to record as `Evaluation::engine_used`.
    #[allow(clippy::too_many_arguments, reason = "the evaluation context this needs has no smaller natural grouping")]
    async fn select_hints(
        &self,
        engine: EvalEngine,
        config: &ava_core::model::scoring_config::ScoringConfig,
        ctx: &SessionEvalContext,
        state: &SessionState,
        fast_hints: RawHints,
        now: time::OffsetDateTime,
        session_id: &ava_core::identifiers::SessionId,
    ) -> (RawHints, &'static str) {
        let wants_generative = match engine {
            EvalEngine::Fast => false,
            EvalEngine::Llm => true,
            EvalEngine::Auto => {
                let trial = fast_hints.composite_trial(ctx, config);
                let cooled_down = state
                    .last_generative_call_at
                    .is_none_or(|last| now - last >= self.generative_cooldown);
                trial >= f64::from(config.tier_thresholds.active) && cooled_down
            }
        };

        if !wants_generative {
            return (fast_hints, "fast");
        }

        let Some(client) = self.generative_client.as_ref() else {
            return (fast_hints, "fast");
        };

        let request = GenerateHintsRequest {
            session_id: session_id.clone(),
            narrative: build_narrative(state.events()),
            detected_friction_ids: ctx.detected_friction_ids.clone(),
            page_type: ctx.intent.page_type,
            event_count: state.events().len(),
        };

        match client.generate_hints(&request).await {
            Ok(hints) => (hints, "llm"),
            Err(error) => {
                self.telemetry.generative_model_fallback(GenerativeModelFallback {
                    session_id: session_id.clone(),
                    reason: provider_error_reason(&error),
                });
                (fast_hints, "fast")
            }
        }
    }

    /// Runs a shadow evaluation alongside the production result and
    /// persists the comparison, best-effort.
    #[allow(clippy::too_many_arguments, reason = "a shadow comparison is inherently a function of the full production evaluation")]
    async fn run_shadow_comparison(
        &self,
        session_id: &ava_core::identifiers::SessionId,
        site_url: &SiteUrl,
        config: &ava_core::model::scoring_config::ScoringConfig,
        ctx: &SessionEvalContext,
        shadow_hints: RawHints,
        production: &ava_core::model::evaluation::MswimResult,
        now: time::OffsetDateTime,
    ) {
        let shadow_result = run_mswim(shadow_hints, config, ctx);
        let comparison = ShadowComparison::from_sides(
            ShadowComparisonId::from(self.shadow_ids.issue()),
            session_id.clone(),
            site_url.clone(),
            None,
            ShadowSide { result: production.clone() },
            ShadowSide { result: shadow_result },
            now,
        );
        let _ = self.shadow_repo.create(comparison).await;
    }

    /// Builds and persists the fired intervention, updates the session's
    /// running counters, and broadcasts it to the widget and dashboard.
    async fn fire_intervention(
        &self,
        session_id: &ava_core::identifiers::SessionId,
        evaluation_id: &EvaluationId,
        result: &ava_core::model::evaluation::MswimResult,
        state: &mut SessionState,
        now: time::OffsetDateTime,
    ) {
        let intervention_type = tier_to_intervention_type(result.tier);
        let friction_id = state.events().iter().rev().find_map(|event| event.friction_id.clone());
        let context_snapshot = SessionContextSnapshot {
            site_url: state.session.site_url.clone(),
            device_type: state.session.device_type,
            referrer_type: state.session.referrer_type,
            is_logged_in: state.session.is_logged_in,
            is_repeat_visitor: state.session.is_repeat_visitor,
            cart_value: state.session.cart_value,
            cart_item_count: state.session.cart_item_count,
            session_age_sec: state.session.age_seconds(now),
            page_type: state.events().back().map_or(ava_core::model::event::PageType::Other, |event| event.page_type),
        };
        let built = build_payload(intervention_type, friction_id.as_ref(), &context_snapshot);

        let intervention = Intervention {
            id: InterventionId::from(self.intervention_ids.issue()),
            session_id: session_id.clone(),
            evaluation_id: evaluation_id.clone(),
            intervention_type,
            friction_id: friction_id.clone(),
            action_code: built.action_code,
            message: built.message,
            mswim_score: result.composite_score,
            tier_at_fire: result.tier,
            payload: built.payload,
            created_at: now,
            status: InterventionStatus::Sent,
            conversion_action: None,
            status_updated_at: now,
        };

        persist_with_retry(self.telemetry.as_ref(), "InterventionRepo::create", Some(session_id.clone()), || {
            let intervention = intervention.clone();
            async move { self.intervention_repo.create(intervention).await }
        })
        .await;

        state
            .session
            .running_counters
            .record_intervention_fired(intervention_type, friction_id, now);

        let session_snapshot = state.session.clone();
        persist_with_retry(self.telemetry.as_ref(), "SessionRepo::update", Some(session_id.clone()), || {
            let session = session_snapshot.clone();
            async move { self.session_repo.update(session).await }
        })
        .await;

        self.hub
            .broadcast_to_channel_for_session(Channel::Widget, session_id, json!({ "kind": "intervention", "intervention": intervention }));
        self.hub
            .broadcast_to_channel(Channel::Dashboard, json!({ "kind": "intervention", "sessionId": session_id.as_str(), "intervention": intervention }));
    }
}

/// Seconds since the session's most recent intervention of any tier, or
/// `None` if no intervention has fired yet.
fn last_intervention_seconds(counters: &ava_core::model::session::SessionRunningCounters, now: time::OffsetDateTime) -> Option<u64> {
    let most_recent = [
        counters.last_intervention_at.active,
        counters.last_intervention_at.nudge,
        counters.last_intervention_at.passive,
        counters.last_intervention_at.escalate,
    ]
    .into_iter()
    .flatten()
    .max()?;
    Some(seconds_between(most_recent, now))
}

/// Resolves the A/B variant's scoring-config and engine override, if an
/// experiment is active for this session's site.
fn resolve_variant_override(
    active_experiment: Option<&Experiment>,
    session_id: &ava_core::identifiers::SessionId,
) -> (Option<ava_core::identifiers::ScoringConfigId>, Option<EvalEngine>) {
    let Some(experiment) = active_experiment else {
        return (None, None);
    };
    let assignment = variant::assign(session_id, &experiment.id, &experiment.variants, experiment.traffic_percent);
    let Some(variant_id) = assignment.variant_id.filter(|_| assignment.enrolled) else {
        return (None, None);
    };
    let Some(variant) = experiment.variants.iter().find(|variant| variant.id == variant_id) else {
        return (None, None);
    };
    (variant.scoring_config_id.clone(), variant.eval_engine)
}

/// Maps a resolved tier to the intervention type fired at it. `Monitor`
/// never fires (`run_mswim`'s decision would be `Suppress`), so it maps to
/// `Passive` defensively rather than being reachable in practice.
const fn tier_to_intervention_type(tier: Tier) -> InterventionType {
    match tier {
        Tier::Monitor | Tier::Passive => InterventionType::Passive,
        Tier::Nudge => InterventionType::Nudge,
        Tier::Active => InterventionType::Active,
        Tier::Escalate => InterventionType::Escalate,
    }
}

const fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Monitor => "monitor",
        Tier::Passive => "passive",
        Tier::Nudge => "nudge",
        Tier::Active => "active",
        Tier::Escalate => "escalate",
    }
}

const fn decision_label(decision: Decision) -> &'static str {
    match decision {
        Decision::Fire => "fire",
        Decision::Suppress => "suppress",
    }
}

/// Extension used only to compute the `auto` engine's trial composite from
/// the fast hints, without running the gate engine (which the trial must
/// not trigger side effects from).
trait TrialComposite {
    /// Runs the adjusters and composite computation only, skipping the gate
    /// engine and tier resolution.
    fn composite_trial(self, ctx: &SessionEvalContext, config: &ava_core::model::scoring_config::ScoringConfig) -> f64;
}

impl TrialComposite for RawHints {
    fn composite_trial(self, ctx: &SessionEvalContext, config: &ava_core::model::scoring_config::ScoringConfig) -> f64 {
        use ava_core::signals::adjust_clarity;
        use ava_core::signals::adjust_friction;
        use ava_core::signals::adjust_intent;
        use ava_core::signals::compute_receptivity;
        use ava_core::signals::compute_value;

        let signals = ava_core::model::evaluation::MswimSignals::new(
            i32::from(adjust_intent(self.intent, ctx.intent)),
            i32::from(adjust_friction(self.friction, &ctx.detected_friction_ids)),
            i32::from(adjust_clarity(self.clarity, ctx.clarity)),
            i32::from(compute_receptivity(self.receptivity, ctx.receptivity)),
            i32::from(compute_value(self.value, ctx.value)),
        );
        signals.composite(&config.weights)
    }
}
