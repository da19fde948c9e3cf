//! Permission predicates (§4.6). All four default to `true`; callers override
//! via [`RulesBuilder`].

use sync_types::ids::{ChannelId, DocId, PeerId};

use crate::model::ChannelKind;

/// What a rule predicate is evaluated against.
pub struct RuleContext<'a> {
	pub peer_id: &'a PeerId,
	pub peer_name: &'a str,
	pub peer_type: &'a str,
	pub channel_id: ChannelId,
	pub channel_kind: ChannelKind,
	pub document: Option<&'a DocId>,
}

type Predicate = dyn Fn(&RuleContext<'_>) -> bool + Send + Sync;

/// The four permission callbacks, each defaulting to an always-true predicate.
pub struct Rules {
	can_announce: Box<Predicate>,
	can_reveal: Box<Predicate>,
	can_subscribe: Box<Predicate>,
	can_update: Box<Predicate>,
}

impl Default for Rules {
	fn default() -> Self {
		Self {
			can_announce: Box::new(|_| true),
			can_reveal: Box::new(|_| true),
			can_subscribe: Box::new(|_| true),
			can_update: Box::new(|_| true),
		}
	}
}

impl Rules {
	pub fn can_announce(&self, ctx: &RuleContext<'_>) -> bool {
		(self.can_announce)(ctx)
	}

	pub fn can_reveal(&self, ctx: &RuleContext<'_>) -> bool {
		(self.can_reveal)(ctx)
	}

	pub fn can_subscribe(&self, ctx: &RuleContext<'_>) -> bool {
		(self.can_subscribe)(ctx)
	}

	pub fn can_update(&self, ctx: &RuleContext<'_>) -> bool {
		(self.can_update)(ctx)
	}
}

/// Builder for partial overrides of [`Rules`]; unset callbacks keep the
/// always-true default.
#[derive(Default)]
pub struct RulesBuilder {
	rules: Rules,
}

impl RulesBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn can_announce(mut self, f: impl Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static) -> Self {
		self.rules.can_announce = Box::new(f);
		self
	}

	pub fn can_reveal(mut self, f: impl Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static) -> Self {
		self.rules.can_reveal = Box::new(f);
		self
	}

	pub fn can_subscribe(mut self, f: impl Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static) -> Self {
		self.rules.can_subscribe = Box::new(f);
		self
	}

	pub fn can_update(mut self, f: impl Fn(&RuleContext<'_>) -> bool + Send + Sync + 'static) -> Self {
		self.rules.can_update = Box::new(f);
		self
	}

	pub fn build(self) -> Rules {
		self.rules
	}
}

/// Convenience matching the source's `createRules()` factory.
pub fn create_rules() -> RulesBuilder {
	RulesBuilder::new()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ctx(peer_id: &PeerId) -> RuleContext<'_> {
		RuleContext {
			peer_id,
			peer_name: "alice",
			peer_type: "browser",
			channel_id: ChannelId::from(1),
			channel_kind: ChannelKind::Network,
			document: None,
		}
	}

	#[test]
	fn defaults_allow_everything() {
		let peer_id = PeerId::parse("1").unwrap();
		let rules = Rules::default();
		let c = ctx(&peer_id);
		assert!(rules.can_announce(&c));
		assert!(rules.can_reveal(&c));
		assert!(rules.can_subscribe(&c));
		assert!(rules.can_update(&c));
	}

	#[test]
	fn builder_overrides_a_single_rule() {
		let peer_id = PeerId::parse("1").unwrap();
		let rules = create_rules().can_update(|_| false).build();
		let c = ctx(&peer_id);
		assert!(rules.can_reveal(&c));
		assert!(!rules.can_update(&c));
	}
}

// vim: ts=4
