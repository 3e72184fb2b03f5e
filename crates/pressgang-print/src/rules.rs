// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rule lookup across a printer's own tables and the shared template tables.
// The printer's list always comes first.

use pressgang_core::rules::{ExtraRule, NumberUpRule, RuleTables, SubstRule};
use pressgang_core::types::{OptionMap, PdfOrientation};

#[derive(Debug, Clone, Copy)]
pub struct RuleChain<'a> {
    printer: &'a RuleTables,
    template: &'a RuleTables,
}

impl<'a> RuleChain<'a> {
    pub fn new(printer: &'a RuleTables, template: &'a RuleTables) -> Self {
        Self { printer, template }
    }

    pub fn has_substitutions(&self) -> bool {
        !self.printer.substitution.is_empty() || !self.template.substitution.is_empty()
    }

    /// First substitution rule rewriting `keyword=value`.
    pub fn substitution(&self, keyword: &str, value: &str, options: &OptionMap) -> Option<&'a SubstRule> {
        self.printer
            .substitution
            .iter()
            .chain(&self.template.substitution)
            .find(|rule| rule.applies(keyword, value, options))
    }

    /// First n-up rule matching the PDF geometry and requested number-up.
    pub fn number_up(&self, pdf: &PdfOrientation, number_up: &str) -> Option<&'a NumberUpRule> {
        self.printer
            .number_up
            .iter()
            .chain(&self.template.number_up)
            .find(|rule| rule.applies(pdf, number_up))
    }

    /// Every extra rule whose conditions hold, in precedence order.
    pub fn extras(self, options: &OptionMap) -> impl Iterator<Item = &'a ExtraRule> {
        self.printer
            .extra
            .iter()
            .chain(&self.template.extra)
            .filter(move |rule| rule.applies(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subst(name: &str, substitute: &str) -> SubstRule {
        SubstRule {
            name: name.into(),
            keyword: "print-quality".into(),
            value: "5".into(),
            conditions: Vec::new(),
            substitute: substitute.into(),
        }
    }

    #[test]
    fn printer_rules_shadow_template_rules() {
        let printer = RuleTables {
            substitution: vec![subst("printer", "4")],
            ..Default::default()
        };
        let template = RuleTables {
            substitution: vec![subst("template", "3")],
            ..Default::default()
        };
        let chain = RuleChain::new(&printer, &template);
        let rule = chain.substitution("print-quality", "5", &OptionMap::new()).unwrap();
        assert_eq!(rule.name, "printer");

        let empty = RuleTables::default();
        let chain = RuleChain::new(&empty, &template);
        assert_eq!(chain.substitution("print-quality", "5", &OptionMap::new()).unwrap().name, "template");
        assert!(chain.has_substitutions());
    }

    #[test]
    fn extras_yield_all_matches_in_order() {
        let rule = |name: &str| ExtraRule {
            name: name.into(),
            conditions: Vec::new(),
            extras: Vec::new(),
        };
        let printer = RuleTables {
            extra: vec![rule("p1")],
            ..Default::default()
        };
        let template = RuleTables {
            extra: vec![rule("t1"), rule("t2")],
            ..Default::default()
        };
        let options = OptionMap::new();
        let names: Vec<&str> = RuleChain::new(&printer, &template)
            .extras(&options)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["p1", "t1", "t2"]);
    }
}
