//! The rule runner: applies compiled rules to a document.
//!
//! Rules run in list order. For each rule the matching targets are collected
//! up front, then each target not yet processed by that rule gets the rule's
//! stages in [`Stage`] order with a data value threaded through them.
//!
//! A successful `body` stage may insert markup that earlier rules would
//! match. The runner then re-enters itself on the element's subtree with
//! only rules `0..=i`, so rules declared first finish the new content before
//! the outer loop continues. Rule `i` stays in range, but re-entry only sees
//! the element's descendants and never repeats a (rule, element) pair.

use serde_json::{Map, Value};

use crate::compile::{CompiledRule, RuleTarget, TargetKey};
use crate::dom::{Dom, NodeId, query_selector_all};
use crate::error::{Error, Result};
use crate::stage::Stage;
use crate::target::{Target, describe_element};

/// Re-entry levels allowed below one top-level target. A body that inserts
/// an element its own rule matches would otherwise recurse without end.
pub const MAX_REENTRY_DEPTH: usize = 64;

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// (rule, target) pairs whose stage chain started.
    pub executions: usize,
    /// Individual stage invocations, including failed ones.
    pub stage_runs: usize,
    /// Deepest re-entry level reached; 0 when no body stage re-entered.
    pub max_depth: usize,
}

/// Run `rules` over the whole document.
pub fn run(rules: &[CompiledRule], dom: &mut Dom) -> Result<RunStats> {
    run_scoped(rules, dom, None, None)
}

/// Run rules with index `<= limit` over the descendants of `subtree`.
///
/// `None` means no limit and the whole document respectively.
pub fn run_scoped(
    rules: &[CompiledRule],
    dom: &mut Dom,
    limit: Option<usize>,
    subtree: Option<NodeId>,
) -> Result<RunStats> {
    let mut runner = Runner {
        dom,
        stats: RunStats::default(),
        depth: 0,
    };
    runner.run(rules, limit, subtree)?;
    Ok(runner.stats)
}

struct Runner<'a> {
    dom: &'a mut Dom,
    stats: RunStats,
    depth: usize,
}

impl Runner<'_> {
    fn run(
        &mut self,
        rules: &[CompiledRule],
        limit: Option<usize>,
        subtree: Option<NodeId>,
    ) -> Result<()> {
        for (i, rule) in rules.iter().enumerate() {
            if limit.is_some_and(|limit| i > limit) {
                break;
            }

            for target in self.targets(rule, subtree) {
                let key = match target {
                    Some(element) => TargetKey::Element(element),
                    None => TargetKey::Global,
                };
                if !rule.mark_processed(key) {
                    continue;
                }

                let body_ran = self.run_stages(rule, target)?;

                if body_ran && let Some(element) = target {
                    if self.depth >= MAX_REENTRY_DEPTH {
                        log::warn!(
                            "`{}` keeps matching its own output; stopped after {} levels",
                            rule.selector_text(),
                            MAX_REENTRY_DEPTH
                        );
                        continue;
                    }
                    self.depth += 1;
                    self.stats.max_depth = self.stats.max_depth.max(self.depth);
                    log::trace!(
                        "re-entering rules 0..={i} under {}",
                        describe_element(self.dom, element)
                    );
                    let result = self.run(rules, Some(i), Some(element));
                    self.depth -= 1;
                    result?;
                }
            }
        }
        Ok(())
    }

    /// Targets of `rule`, collected before any stage runs.
    fn targets(&self, rule: &CompiledRule, subtree: Option<NodeId>) -> Vec<Option<NodeId>> {
        match rule.target() {
            RuleTarget::Global => vec![None],
            RuleTarget::Selectors(selectors) => {
                let scope = subtree.unwrap_or_else(|| self.dom.document());
                query_selector_all(self.dom, scope, selectors)
                    .into_iter()
                    .map(Some)
                    .collect()
            }
        }
    }

    /// Run every stage of `rule` on one target. Returns whether the `body`
    /// stage completed.
    fn run_stages(&mut self, rule: &CompiledRule, element: Option<NodeId>) -> Result<bool> {
        self.stats.executions += 1;
        log::debug!(
            "running `{}` on {}",
            rule.selector_text(),
            element
                .map(|e| describe_element(self.dom, e))
                .unwrap_or_else(|| "global target".to_string())
        );

        let mut data = Value::Object(Map::new());
        let mut body_ran = false;

        for stage in rule.stages() {
            self.stats.stage_runs += 1;
            let mut target = match element {
                Some(element) => Target::element(self.dom, element),
                None => Target::global(self.dom),
            };

            match stage.run(&mut target, &data) {
                Ok(Some(next)) => data = next,
                Ok(None) => {}
                Err(Error::UserCode(error)) => {
                    // Only this target's remaining stages are skipped.
                    stage.log_error(target.describe(), &error);
                    break;
                }
                Err(e) => return Err(e),
            }

            if stage.stage() == Stage::Body {
                body_ran = true;
            }
        }

        Ok(body_ran)
    }
}
