use crate::domain::Schema;
use crate::eval::is_named_date;
use crate::filter::tree::{
    Node, TAG_ATTMOD, TAG_ATTRIBUTE, TAG_ID, TAG_IMPLICIT, TAG_INFIX, TAG_OPERAND, TAG_PATTERN,
    TAG_TAG, TAG_UUID, TAG_WORD,
};
use crate::filter::FilterParseError;
use chrono::NaiveDate;
use uuid::Uuid;

const MODIFIERS: [&str; 15] = [
    "is", "equals", "isnt", "not", "before", "under", "below", "after", "over", "above", "has",
    "contains", "hasnt", "none", "any",
];

const INFIX_SYMBOLS: [&str; 16] = [
    "==", "!=", "=", "<", "<=", ">", ">=", "~", "!~", "+", "-", "*", "/", "%", "_hastag_",
    "_notag_",
];

/// Anything that can hand the filter its tree and the expression text
/// lowered from it.
pub trait FilterSource {
    fn tree(&self) -> &Node;
    fn expression(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilter {
    tree: Node,
    expression: String,
}

impl Default for ParsedFilter {
    fn default() -> Self {
        Self {
            tree: Node::root(),
            expression: String::new(),
        }
    }
}

impl ParsedFilter {
    pub fn is_empty(&self) -> bool {
        self.expression.trim().is_empty()
    }
}

impl FilterSource for ParsedFilter {
    fn tree(&self) -> &Node {
        &self.tree
    }

    fn expression(&self) -> &str {
        &self.expression
    }
}

/// Lowers a single filter string. Quoted runs stay one word.
pub fn parse_filter(input: &str, schema: &Schema) -> Result<ParsedFilter, FilterParseError> {
    let words = split_words(input)?;
    parse_filter_args(&words, schema)
}

/// Lowers already-split command-line words into the filter tree and its
/// infix expression.
pub fn parse_filter_args<S: AsRef<str>>(
    args: &[S],
    schema: &Schema,
) -> Result<ParsedFilter, FilterParseError> {
    let mut words = Vec::new();
    for arg in args {
        split_parens(arg.as_ref(), &mut words);
    }

    let mut items: Vec<Item> = Vec::new();
    let mut depth = 0usize;
    let mut index = 0;
    while index < words.len() {
        let word = words[index].as_str();
        index += 1;

        if let Some(canonical) = connective(word) {
            match canonical {
                "(" => depth += 1,
                ")" => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or(FilterParseError::UnbalancedParens)?;
                }
                _ => {}
            }
            items.push(Item::Op(canonical));
            continue;
        }

        let follows_operand = matches!(items.last(), Some(Item::Term(_)));
        if INFIX_SYMBOLS.contains(&word) && follows_operand {
            let Some(right) = words.get(index) else {
                return Err(FilterParseError::MissingOperand(word.to_string()));
            };
            index += 1;
            let Some(Item::Term(left)) = items.pop() else {
                return Err(FilterParseError::MissingOperand(word.to_string()));
            };
            if is_selector(&left.node) {
                return Err(FilterParseError::SelectorOperand(format!(
                    "{} {} {}",
                    left.raw, word, right
                )));
            }
            items.push(Item::Term(extend_infix(left, word, right, schema)));
            continue;
        }

        items.push(Item::Term(lower_word(word, schema)?));
    }

    if depth != 0 {
        return Err(FilterParseError::UnbalancedParens);
    }

    Ok(assemble(items))
}

enum Item {
    Op(&'static str),
    Term(Term),
}

struct Term {
    node: Node,
    text: String,
    raw: String,
}

fn connective(word: &str) -> Option<&'static str> {
    let canonical = match word {
        "(" => "(",
        ")" => ")",
        "and" => "and",
        "or" => "or",
        "xor" => "xor",
        "not" | "!" => "not",
        _ => return None,
    };
    Some(canonical)
}

fn assemble(items: Vec<Item>) -> ParsedFilter {
    let mut out = Assembly {
        tree: Node::root(),
        parts: Vec::new(),
        previous: Previous::Start,
    };
    let mut run: Vec<Term> = Vec::new();

    for item in items {
        match item {
            Item::Term(term) if is_selector(&term.node) => run.push(term),
            Item::Term(term) => {
                out.flush_run(&mut run);
                out.junction();
                out.term(term);
            }
            Item::Op(op) => {
                out.flush_run(&mut run);
                if op == "(" || op == "not" {
                    out.junction();
                }
                out.op(Node::operator(op), op);
            }
        }
    }
    out.flush_run(&mut run);

    ParsedFilter {
        tree: out.tree,
        expression: out.parts.join(" "),
    }
}

#[derive(PartialEq, Eq)]
enum Previous {
    Start,
    Operator,
    Operand,
}

struct Assembly {
    tree: Node,
    parts: Vec<String>,
    previous: Previous,
}

impl Assembly {
    /// Adjacent operands get an implicit `and`.
    fn junction(&mut self) {
        if self.previous == Previous::Operand {
            self.op(Node::operator("and").with_tag(TAG_IMPLICIT), "and");
        }
    }

    fn op(&mut self, node: Node, text: &str) {
        self.previous = if text == ")" {
            Previous::Operand
        } else {
            Previous::Operator
        };
        self.tree.push(node);
        self.parts.push(text.to_string());
    }

    fn term(&mut self, term: Term) {
        self.previous = Previous::Operand;
        self.tree.push(term.node);
        self.parts.push(term.text);
    }

    /// A run of ID/UUID selectors is one alternative: `( a or b ... )`.
    fn flush_run(&mut self, run: &mut Vec<Term>) {
        if run.is_empty() {
            return;
        }
        self.junction();
        if run.len() == 1 {
            let term = run.remove(0);
            self.term(term);
            return;
        }
        self.op(Node::operator("(").with_tag(TAG_IMPLICIT), "(");
        for (index, term) in run.drain(..).enumerate() {
            if index > 0 {
                self.op(Node::operator("or").with_tag(TAG_IMPLICIT), "or");
            }
            self.term(term);
        }
        self.op(Node::operator(")").with_tag(TAG_IMPLICIT), ")");
    }
}

fn is_selector(node: &Node) -> bool {
    node.has_tag(TAG_ID) || node.has_tag(TAG_UUID)
}

fn lower_word(word: &str, schema: &Schema) -> Result<Term, FilterParseError> {
    if let Some(term) = lower_ids(word)? {
        return Ok(term);
    }
    if let Some(term) = lower_uuid(word) {
        return Ok(term);
    }
    if let Some(term) = lower_tag(word)? {
        return Ok(term);
    }
    if let Some(term) = lower_attribute(word, schema)? {
        return Ok(term);
    }
    if let Some(pattern) = word
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
        .filter(|pattern| !pattern.is_empty())
    {
        return Ok(Term {
            node: Node::new(word)
                .with_tag(TAG_PATTERN)
                .with_attribute("value", pattern),
            text: format!("description ~ {}", quote(pattern)),
            raw: word.to_string(),
        });
    }

    Ok(Term {
        node: Node::new(word)
            .with_tag(TAG_WORD)
            .with_attribute("value", word),
        text: format!("description ~ {}", quote(word)),
        raw: word.to_string(),
    })
}

fn lower_ids(word: &str) -> Result<Option<Term>, FilterParseError> {
    if !word.starts_with(|ch: char| ch.is_ascii_digit())
        || !word
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch == ',' || ch == '-')
    {
        return Ok(None);
    }

    let mut clauses = Vec::new();
    for part in word.split(',') {
        let (low, high) = match part.split_once('-') {
            Some((low, high)) => (low, Some(high)),
            None => (part, None),
        };
        let Ok(low) = low.parse::<u64>() else {
            return Ok(None);
        };
        let high = match high {
            Some(high) => match high.parse::<u64>() {
                Ok(high) => Some(high),
                Err(_) => return Ok(None),
            },
            None => None,
        };
        if low == 0 || high.is_some_and(|high| high < low) {
            return Err(FilterParseError::InvalidId(part.to_string()));
        }
        clauses.push(match high {
            Some(high) if high != low => format!("( id >= {low} and id <= {high} )"),
            _ => format!("id == {low}"),
        });
    }

    let text = if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        format!("( {} )", clauses.join(" or "))
    };
    Ok(Some(Term {
        node: Node::new(word)
            .with_tag(TAG_ID)
            .with_attribute("value", word),
        text,
        raw: word.to_string(),
    }))
}

fn lower_uuid(word: &str) -> Option<Term> {
    let is_short = word.len() == 8 && word.chars().all(|ch| ch.is_ascii_hexdigit());
    let is_full = word.len() == 36 && Uuid::parse_str(word).is_ok();
    if !is_short && !is_full {
        return None;
    }
    let prefix = word.to_ascii_lowercase();
    Some(Term {
        text: format!("uuid = {}", quote(&prefix)),
        node: Node::new(word)
            .with_tag(TAG_UUID)
            .with_attribute("value", prefix),
        raw: word.to_string(),
    })
}

fn lower_tag(word: &str) -> Result<Option<Term>, FilterParseError> {
    let (operator, name) = if let Some(name) = word.strip_prefix('+') {
        ("_hastag_", name)
    } else if let Some(name) = word.strip_prefix('-') {
        if name.parse::<f64>().is_ok() {
            return Ok(None);
        }
        ("_notag_", name)
    } else {
        return Ok(None);
    };

    if name.is_empty() {
        return Err(FilterParseError::EmptyTag);
    }
    if name.contains(',') || name.chars().any(char::is_whitespace) {
        return Err(FilterParseError::InvalidTag(name.to_string()));
    }

    Ok(Some(Term {
        node: Node::new(word)
            .with_tag(TAG_TAG)
            .with_attribute("name", name)
            .with_attribute("sign", &word[..1]),
        text: format!("tags {operator} {}", quote(name)),
        raw: word.to_string(),
    }))
}

fn lower_attribute(word: &str, schema: &Schema) -> Result<Option<Term>, FilterParseError> {
    let Some((key, value)) = word.split_once(':') else {
        return Ok(None);
    };
    let (name, modifier) = match key.split_once('.') {
        Some((name, modifier)) => (name, Some(modifier)),
        None => (key, None),
    };
    if !schema.contains(name) {
        return Ok(None);
    }
    if let Some(modifier) = modifier {
        if !MODIFIERS.contains(&modifier) {
            return Err(FilterParseError::InvalidModifier(modifier.to_string()));
        }
    }

    let operand = attribute_operand(name, value, schema);
    let text = match modifier {
        None if value.is_empty() => format!("{name} == \"\""),
        None => format!("{name} = {operand}"),
        Some("is" | "equals") => format!("{name} == {operand}"),
        Some("isnt" | "not") => format!("{name} != {operand}"),
        Some("before" | "under" | "below") => format!("{name} < {operand}"),
        Some("after" | "over" | "above") => format!("{name} > {operand}"),
        Some("has" | "contains") => format!("{name} ~ {}", quote(value)),
        Some("hasnt") => format!("{name} !~ {}", quote(value)),
        Some("none") => format!("{name} == \"\""),
        _ => format!("{name} != \"\""),
    };

    let mut node = Node::new(word)
        .with_tag(TAG_ATTRIBUTE)
        .with_attribute("name", name)
        .with_attribute("value", value);
    if let Some(modifier) = modifier {
        node.tag(TAG_ATTMOD);
        node.set_attribute("modifier", modifier);
    }

    Ok(Some(Term {
        node,
        text,
        raw: word.to_string(),
    }))
}

fn attribute_operand(name: &str, value: &str, schema: &Schema) -> String {
    let verbatim = match name {
        "id" => value.parse::<u64>().is_ok(),
        _ if schema.is_date(name) => is_named_date(value) || is_date_literal(value),
        _ => false,
    };
    if verbatim {
        value.to_string()
    } else {
        quote(value)
    }
}

fn extend_infix(left: Term, operator: &str, right: &str, schema: &Schema) -> Term {
    let right_text = infix_operand(right, schema);
    let (mut node, text) = if left.node.has_tag(TAG_INFIX) {
        (left.node, format!("{} {operator} {right_text}", left.text))
    } else {
        let mut group = Node::new("infix").with_tag(TAG_INFIX);
        group.push(Node::new(left.raw.as_str()).with_tag(TAG_OPERAND));
        (group, format!("{} {operator} {right_text}", left.raw))
    };
    node.push(Node::operator(operator));
    node.push(Node::new(right).with_tag(TAG_OPERAND));
    node.set_attribute("raw", text.as_str());

    let raw = format!("{} {operator} {right}", left.raw);
    Term { node, text, raw }
}

/// Right-hand operands pass through when the expression language can read
/// them as-is; anything else becomes a string literal.
fn infix_operand(word: &str, schema: &Schema) -> String {
    let is_literal = word.starts_with('"')
        || word.starts_with('\'')
        || word.parse::<f64>().is_ok()
        || is_date_literal(word)
        || is_named_date(word);
    let base = word.split_once('.').map_or(word, |(base, _)| base);
    if is_literal || schema.contains(base) {
        word.to_string()
    } else {
        quote(word)
    }
}

fn is_date_literal(word: &str) -> bool {
    let date = word.get(..10).unwrap_or(word);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn split_parens(word: &str, out: &mut Vec<String>) {
    let mut rest = word;
    while rest.len() > 1 && rest.starts_with('(') {
        out.push("(".to_string());
        rest = &rest[1..];
    }
    let mut closing = 0;
    while rest.len() > 1 && rest.ends_with(')') {
        closing += 1;
        rest = &rest[..rest.len() - 1];
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out.extend(std::iter::repeat(")".to_string()).take(closing));
}

fn split_words(input: &str) -> Result<Vec<String>, FilterParseError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' | '\'' => {
                in_word = true;
                let quote = ch;
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => current.push(escaped),
                            None => return Err(FilterParseError::UnterminatedQuote),
                        },
                        Some(inner) if inner == quote => break,
                        Some(inner) => current.push(inner),
                        None => return Err(FilterParseError::UnterminatedQuote),
                    }
                }
            }
            ch if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            ch => {
                in_word = true;
                current.push(ch);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::{parse_filter, parse_filter_args, FilterSource};
    use crate::domain::Schema;
    use crate::filter::tree::{TAG_ATTMOD, TAG_ID, TAG_IMPLICIT, TAG_INFIX, TAG_TAG, TAG_UUID};
    use crate::filter::FilterParseError;

    fn lower(input: &str) -> String {
        parse_filter(input, &Schema::builtin())
            .unwrap()
            .expression()
            .to_string()
    }

    #[test]
    fn empty_input_is_empty_filter() {
        let filter = parse_filter("   ", &Schema::builtin()).unwrap();
        assert!(filter.is_empty());
        assert!(filter.tree().branches().is_empty());
    }

    #[test]
    fn attributes_and_modifiers() {
        assert_eq!(lower("project:Home"), "project = \"Home\"");
        assert_eq!(lower("project:"), "project == \"\"");
        assert_eq!(lower("priority.isnt:H"), "priority != \"H\"");
        assert_eq!(lower("due.before:eom"), "due < eom");
        assert_eq!(lower("due:2024-03-01"), "due = 2024-03-01");
        assert_eq!(lower("description.has:milk"), "description ~ \"milk\"");
        assert_eq!(lower("project.any:"), "project != \"\"");
        assert_eq!(lower("id:3"), "id = 3");
    }

    #[test]
    fn modifier_nodes_keep_attribute_tag() {
        let filter = parse_filter("due.after:today", &Schema::builtin()).unwrap();
        let node = &filter.tree().branches()[0];
        assert!(node.has_tag(TAG_ATTMOD));
        assert_eq!(node.attribute("name"), Some("due"));
        assert_eq!(node.attribute("modifier"), Some("after"));
    }

    #[test]
    fn unknown_modifier_is_error() {
        let err = parse_filter("due.around:today", &Schema::builtin()).unwrap_err();
        assert_eq!(err, FilterParseError::InvalidModifier("around".to_string()));
    }

    #[test]
    fn unknown_names_are_words() {
        assert_eq!(lower("http://example"), "description ~ \"http://example\"");
        assert_eq!(lower("milk"), "description ~ \"milk\"");
        assert_eq!(lower("/mi.k/"), "description ~ \"mi.k\"");
    }

    #[test]
    fn ids_and_ranges() {
        assert_eq!(lower("4"), "id == 4");
        assert_eq!(lower("1,3-5"), "( id == 1 or ( id >= 3 and id <= 5 ) )");
        let filter = parse_filter("1 2", &Schema::builtin()).unwrap();
        assert_eq!(filter.expression(), "( id == 1 or id == 2 )");
        let branches = filter.tree().branches();
        assert!(branches[0].has_tag(TAG_IMPLICIT));
        assert!(branches[1].has_tag(TAG_ID));
        assert!(branches[2].has_tag(TAG_IMPLICIT));
        assert!(branches[2].is_operator("or"));
        assert_eq!(
            lower("project:Home 1 2"),
            "project = \"Home\" and ( id == 1 or id == 2 )"
        );
        assert_eq!(lower("1 project:Home"), "id == 1 and project = \"Home\"");
        assert_eq!(
            parse_filter("5-2", &Schema::builtin()).unwrap_err(),
            FilterParseError::InvalidId("5-2".to_string())
        );
    }

    #[test]
    fn uuids() {
        let filter = parse_filter("ABCDEF12", &Schema::builtin()).unwrap();
        assert_eq!(filter.expression(), "uuid = \"abcdef12\"");
        assert!(filter.tree().branches()[0].has_tag(TAG_UUID));
    }

    #[test]
    fn tags() {
        assert_eq!(lower("+home -work"), "tags _hastag_ \"home\" and tags _notag_ \"work\"");
        let filter = parse_filter("+home", &Schema::builtin()).unwrap();
        assert!(filter.tree().branches()[0].has_tag(TAG_TAG));
        assert_eq!(
            parse_filter("+", &Schema::builtin()).unwrap_err(),
            FilterParseError::EmptyTag
        );
    }

    #[test]
    fn explicit_operators_and_parens() {
        assert_eq!(
            lower("(project:Home or +urgent) not +later"),
            "( project = \"Home\" or tags _hastag_ \"urgent\" ) and not tags _hastag_ \"later\""
        );
        assert_eq!(
            parse_filter("( project:Home", &Schema::builtin()).unwrap_err(),
            FilterParseError::UnbalancedParens
        );
    }

    #[test]
    fn infix_groups_pass_through() {
        let filter = parse_filter("project == Home", &Schema::builtin()).unwrap();
        assert_eq!(filter.expression(), "project == \"Home\"");
        let node = &filter.tree().branches()[0];
        assert!(node.has_tag(TAG_INFIX));
        assert_eq!(node.branches().len(), 3);

        assert_eq!(lower("due < eom"), "due < eom");
        assert_eq!(lower("due.year >= 2024"), "due.year >= 2024");
        assert_eq!(lower("nosuchfield == 1"), "nosuchfield == 1");
    }

    #[test]
    fn ids_and_uuids_are_not_infix_operands() {
        assert_eq!(
            parse_filter("1 - 2", &Schema::builtin()).unwrap_err(),
            FilterParseError::SelectorOperand("1 - 2".to_string())
        );
        assert!(matches!(
            parse_filter("project:Home 1-3 + 1", &Schema::builtin()),
            Err(FilterParseError::SelectorOperand(_))
        ));
        assert!(matches!(
            parse_filter("abcdef12 == x", &Schema::builtin()),
            Err(FilterParseError::SelectorOperand(_))
        ));
        assert_eq!(lower("1-2"), "( id >= 1 and id <= 2 )");
        assert_eq!(lower("id == 2"), "id == 2");
    }

    #[test]
    fn quoted_words_stay_together() {
        let filter = parse_filter("'buy milk' project:\"Big Home\"", &Schema::builtin()).unwrap();
        assert_eq!(
            filter.expression(),
            "description ~ \"buy milk\" and project = \"Big Home\""
        );
        assert_eq!(
            parse_filter("'open", &Schema::builtin()).unwrap_err(),
            FilterParseError::UnterminatedQuote
        );
    }

    #[test]
    fn args_are_not_resplit() {
        let filter = parse_filter_args(&["description.has:two words"], &Schema::builtin()).unwrap();
        assert_eq!(filter.expression(), "description ~ \"two words\"");
    }

    #[test]
    fn udas_are_attributes() {
        let schema = Schema::with_udas(["estimate"]).unwrap();
        let filter = parse_filter("estimate:3", &schema).unwrap();
        assert_eq!(filter.expression(), "estimate = \"3\"");
    }
}
