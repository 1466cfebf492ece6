use serde::{Deserialize, Serialize};

/// Ordered thinking-effort tiers. Mirrors `_THINKING_LEVELS`/
/// `_THINKING_LEVELS_WITH_XHIGH` in `agent_session.py` — `XHigh` only
/// appears in the cycle for models that advertise it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingLevel {
    Off,
    Minimal,
    Low,
    Medium,
    High,
    XHigh,
}

impl ThinkingLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ThinkingLevel::Off => "off",
            ThinkingLevel::Minimal => "minimal",
            ThinkingLevel::Low => "low",
            ThinkingLevel::Medium => "medium",
            ThinkingLevel::High => "high",
            ThinkingLevel::XHigh => "xhigh",
        }
    }

    /// Parse the string form persisted by `thinking_level_change` entries.
    pub fn parse(s: &str) -> Option<ThinkingLevel> {
        match s {
            "off" => Some(ThinkingLevel::Off),
            "minimal" => Some(ThinkingLevel::Minimal),
            "low" => Some(ThinkingLevel::Low),
            "medium" => Some(ThinkingLevel::Medium),
            "high" => Some(ThinkingLevel::High),
            "xhigh" => Some(ThinkingLevel::XHigh),
            _ => None,
        }
    }

    /// The tiers available for a model, in cycle order.
    pub fn tiers(supports_xhigh: bool) -> &'static [ThinkingLevel] {
        if supports_xhigh {
            &[
                ThinkingLevel::Off,
                ThinkingLevel::Minimal,
                ThinkingLevel::Low,
                ThinkingLevel::Medium,
                ThinkingLevel::High,
                ThinkingLevel::XHigh,
            ]
        } else {
            &[
                ThinkingLevel::Off,
                ThinkingLevel::Minimal,
                ThinkingLevel::Low,
                ThinkingLevel::Medium,
                ThinkingLevel::High,
            ]
        }
    }

    /// Clamp to the nearest tier the model supports, matching
    /// `_clamp_thinking_level`'s "drop to the highest tier at or below"
    /// behavior (an `XHigh` setting surviving a switch to a
    /// non-`XHigh` model becomes `High`, not `Off`).
    pub fn clamp(self, supports_xhigh: bool) -> ThinkingLevel {
        let tiers = Self::tiers(supports_xhigh);
        if tiers.contains(&self) {
            return self;
        }
        *tiers.last().expect("tiers is never empty")
    }

    /// Next tier in the cycle, wrapping around. Returns `None` if the
    /// model supports only `Off` (nothing to cycle through).
    pub fn next(self, supports_xhigh: bool) -> Option<ThinkingLevel> {
        let tiers = Self::tiers(supports_xhigh);
        if tiers == [ThinkingLevel::Off] {
            return None;
        }
        let idx = tiers.iter().position(|&t| t == self).unwrap_or(0);
        Some(tiers[(idx + 1) % tiers.len()])
    }
}

/// Everything the controller needs to know about one selectable model,
/// without owning how its API key gets resolved — that's left to whatever
/// the caller wires in via [`ModelCatalog`], consistent with auth/model
/// resolution being an external-collaborator concern (§1 Non-goals).
/// Mirrors the fields `agent_session.py` reads off its `Model`/
/// `ModelRegistry` objects (`context_window`, `supports_xhigh`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub provider: String,
    pub model_id: String,
    pub context_window: u32,
    pub supports_xhigh: bool,
}

/// Source of truth for which models are selectable right now. A real
/// implementation filters to models with a resolvable API key the way
/// `ModelRegistry.get_available()` does; this crate only consumes the
/// trait, grounded on `corvid_llm`'s boxed-backend pattern
/// (`LanguageModelProvider`/`LanguageModelProviderBackend`) rather than
/// inventing a new erasure shape.
pub trait ModelCatalog: Send + Sync {
    /// Models currently usable, in cycle order.
    fn available(&self) -> Vec<ModelInfo>;

    fn info(&self, provider: &str, model_id: &str) -> Option<ModelInfo> {
        self.available()
            .into_iter()
            .find(|m| m.provider == provider && m.model_id == model_id)
    }
}

/// Direction for [`cycle_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    Forward,
    Backward,
}

/// Rotate to the next/previous available model relative to `current`.
/// Returns `None` if fewer than two models are available (mirrors
/// `cycle_model()` returning `None` in that case) or if `current` isn't
/// in the catalog, in which case cycling starts from the front.
pub fn cycle_model(
    catalog: &dyn ModelCatalog,
    current: Option<&ModelInfo>,
    direction: CycleDirection,
) -> Option<ModelInfo> {
    let available = catalog.available();
    if available.len() <= 1 {
        return None;
    }
    let current_idx = current
        .and_then(|cur| available.iter().position(|m| m == cur))
        .unwrap_or(0);
    let n = available.len();
    let next_idx = match direction {
        CycleDirection::Forward => (current_idx + 1) % n,
        CycleDirection::Backward => (current_idx + n - 1) % n,
    };
    Some(available[next_idx].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCatalog(Vec<ModelInfo>);
    impl ModelCatalog for FixedCatalog {
        fn available(&self) -> Vec<ModelInfo> {
            self.0.clone()
        }
    }

    fn model(provider: &str, id: &str) -> ModelInfo {
        ModelInfo {
            provider: provider.into(),
            model_id: id.into(),
            context_window: 200_000,
            supports_xhigh: false,
        }
    }

    #[test]
    fn thinking_level_cycles_and_wraps() {
        assert_eq!(ThinkingLevel::Off.next(false), Some(ThinkingLevel::Minimal));
        assert_eq!(ThinkingLevel::High.next(false), Some(ThinkingLevel::Off));
        assert_eq!(ThinkingLevel::High.next(true), Some(ThinkingLevel::XHigh));
    }

    #[test]
    fn thinking_level_clamps_down_when_model_drops_xhigh() {
        assert_eq!(ThinkingLevel::XHigh.clamp(false), ThinkingLevel::High);
        assert_eq!(ThinkingLevel::Medium.clamp(false), ThinkingLevel::Medium);
    }

    #[test]
    fn cycle_model_wraps_forward_and_back() {
        let catalog = FixedCatalog(vec![model("a", "1"), model("a", "2"), model("b", "1")]);
        let first = model("a", "1");
        let next = cycle_model(&catalog, Some(&first), CycleDirection::Forward).unwrap();
        assert_eq!(next, model("a", "2"));
        let prev = cycle_model(&catalog, Some(&first), CycleDirection::Backward).unwrap();
        assert_eq!(prev, model("b", "1"));
    }

    #[test]
    fn cycle_model_none_with_single_model() {
        let catalog = FixedCatalog(vec![model("a", "1")]);
        assert!(cycle_model(&catalog, Some(&model("a", "1")), CycleDirection::Forward).is_none());
    }
}
