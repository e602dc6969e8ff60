use crate::domain::{Task, DATE_ATTRIBUTES};
use crate::eval::NamedDates;
use crate::filter::shadow::Oracle;
use crate::filter::tree::{
    Node, TAG_ATTRIBUTE, TAG_ID, TAG_INFIX, TAG_OP, TAG_OPERAND, TAG_PATTERN, TAG_TAG, TAG_UUID,
    TAG_WORD,
};
use crate::time::parse_date_text;
use chrono::{DateTime, FixedOffset, Utc};
use std::cmp::Ordering;

/// The old term-by-term filter. It reads the tree directly and knows
/// nothing about the expression compiler; it survives only as an oracle.
#[derive(Debug, Clone)]
pub struct LegacyFilter {
    pieces: Vec<Piece>,
    offset: FixedOffset,
}

#[derive(Debug, Clone)]
enum Piece {
    Open,
    Close,
    And,
    Or,
    Xor,
    Not,
    Term(Term),
}

#[derive(Debug, Clone)]
enum Term {
    Attribute {
        name: String,
        modifier: Option<String>,
        value: String,
        date: Option<DateTime<Utc>>,
    },
    Ids(Vec<(u64, u64)>),
    Uuid(String),
    Tag {
        name: String,
        present: bool,
    },
    Description(String),
    Compare {
        name: String,
        op: String,
        value: String,
        date: Option<DateTime<Utc>>,
    },
    Unsupported,
}

impl LegacyFilter {
    pub fn new(tree: &Node, dates: &NamedDates, offset: FixedOffset) -> Self {
        let resolve_date = |text: &str| dates.lookup(text).or_else(|| parse_date_text(text, offset));
        let pieces = tree
            .branches()
            .iter()
            .map(|node| piece(node, &resolve_date))
            .collect();
        Self { pieces, offset }
    }

    fn or_expr(&self, task: &Task, pos: &mut usize) -> Option<bool> {
        let mut result = self.xor_expr(task, pos)?;
        while matches!(self.pieces.get(*pos), Some(Piece::Or)) {
            *pos += 1;
            let right = self.xor_expr(task, pos)?;
            result = result || right;
        }
        Some(result)
    }

    fn xor_expr(&self, task: &Task, pos: &mut usize) -> Option<bool> {
        let mut result = self.and_expr(task, pos)?;
        while matches!(self.pieces.get(*pos), Some(Piece::Xor)) {
            *pos += 1;
            let right = self.and_expr(task, pos)?;
            result ^= right;
        }
        Some(result)
    }

    fn and_expr(&self, task: &Task, pos: &mut usize) -> Option<bool> {
        let mut result = self.unary(task, pos)?;
        while matches!(self.pieces.get(*pos), Some(Piece::And)) {
            *pos += 1;
            let right = self.unary(task, pos)?;
            result = result && right;
        }
        Some(result)
    }

    fn unary(&self, task: &Task, pos: &mut usize) -> Option<bool> {
        let piece = self.pieces.get(*pos)?;
        *pos += 1;
        match piece {
            Piece::Not => self.unary(task, pos).map(|value| !value),
            Piece::Open => {
                let value = self.or_expr(task, pos)?;
                match self.pieces.get(*pos) {
                    Some(Piece::Close) => {
                        *pos += 1;
                        Some(value)
                    }
                    _ => None,
                }
            }
            Piece::Term(term) => Some(self.term(term, task)),
            Piece::Close | Piece::And | Piece::Or | Piece::Xor => None,
        }
    }

    fn term(&self, term: &Term, task: &Task) -> bool {
        match term {
            Term::Attribute {
                name,
                modifier,
                value,
                date,
            } => {
                let actual = attribute(task, name);
                match date {
                    Some(date) => self.date_modifier(&actual, modifier.as_deref(), *date),
                    None => text_modifier(name, &actual, modifier.as_deref(), value),
                }
            }
            Term::Ids(ranges) => task
                .id
                .is_some_and(|id| ranges.iter().any(|(low, high)| (*low..=*high).contains(&id))),
            Term::Uuid(prefix) => task.uuid.to_string().starts_with(prefix.as_str()),
            Term::Tag { name, present } => task.has_tag(name) == *present,
            Term::Description(text) => task.get("description").unwrap_or_default().contains(text.as_str()),
            Term::Compare {
                name,
                op,
                value,
                date,
            } => self.compare(&attribute(task, name), op, value, *date),
            Term::Unsupported => true,
        }
    }

    fn date_modifier(&self, actual: &str, modifier: Option<&str>, wanted: DateTime<Utc>) -> bool {
        let parsed = parse_date_text(actual, self.offset);
        match modifier {
            None => parsed.is_some_and(|parsed| self.same_day(parsed, wanted)),
            Some("is" | "equals") => parsed == Some(wanted),
            Some("isnt" | "not") => parsed != Some(wanted),
            Some("before" | "under" | "below") => parsed.is_some_and(|parsed| parsed < wanted),
            Some("after" | "over" | "above") => parsed.is_some_and(|parsed| parsed > wanted),
            Some("none") => actual.is_empty(),
            Some("any") => !actual.is_empty(),
            Some(_) => true,
        }
    }

    fn compare(&self, actual: &str, op: &str, value: &str, date: Option<DateTime<Utc>>) -> bool {
        let ordering = match date {
            Some(date) => parse_date_text(actual, self.offset).map(|parsed| parsed.cmp(&date)),
            None => Some(actual.cmp(value)),
        };
        match op {
            "==" => ordering == Some(Ordering::Equal),
            "!=" => ordering != Some(Ordering::Equal),
            "=" => match date {
                Some(date) => {
                    parse_date_text(actual, self.offset).is_some_and(|parsed| self.same_day(parsed, date))
                }
                None if value.is_empty() => actual.is_empty(),
                None => actual.starts_with(value),
            },
            "<" => ordering == Some(Ordering::Less),
            "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            ">" => ordering == Some(Ordering::Greater),
            ">=" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            "~" => actual.contains(value),
            "!~" => !actual.contains(value),
            _ => true,
        }
    }

    fn same_day(&self, left: DateTime<Utc>, right: DateTime<Utc>) -> bool {
        left.with_timezone(&self.offset).date_naive() == right.with_timezone(&self.offset).date_naive()
    }
}

impl Oracle for LegacyFilter {
    fn eval_filter(&self, task: &Task) -> bool {
        if self.pieces.is_empty() {
            return true;
        }
        let mut pos = 0;
        match self.or_expr(task, &mut pos) {
            Some(value) if pos == self.pieces.len() => value,
            _ => false,
        }
    }
}

fn piece(node: &Node, resolve_date: &dyn Fn(&str) -> Option<DateTime<Utc>>) -> Piece {
    if node.has_tag(TAG_OP) {
        return match node.attribute("canonical") {
            Some("(") => Piece::Open,
            Some(")") => Piece::Close,
            Some("and") => Piece::And,
            Some("or") => Piece::Or,
            Some("xor") => Piece::Xor,
            Some("not") => Piece::Not,
            _ => Piece::Term(Term::Unsupported),
        };
    }

    let value = node.attribute("value").unwrap_or_default().to_string();
    let term = if node.has_tag(TAG_ATTRIBUTE) {
        let name = node.attribute("name").unwrap_or_default().to_string();
        let date = if DATE_ATTRIBUTES.contains(&name.as_str()) {
            resolve_date(&value)
        } else {
            None
        };
        Term::Attribute {
            name,
            modifier: node.attribute("modifier").map(str::to_string),
            value,
            date,
        }
    } else if node.has_tag(TAG_ID) {
        id_ranges(&value).map_or(Term::Unsupported, Term::Ids)
    } else if node.has_tag(TAG_UUID) {
        Term::Uuid(value)
    } else if node.has_tag(TAG_TAG) {
        Term::Tag {
            name: node.attribute("name").unwrap_or_default().to_string(),
            present: node.attribute("sign") == Some("+"),
        }
    } else if node.has_tag(TAG_PATTERN) || node.has_tag(TAG_WORD) {
        Term::Description(value)
    } else if node.has_tag(TAG_INFIX) {
        infix(node, resolve_date)
    } else {
        Term::Unsupported
    };
    Piece::Term(term)
}

fn infix(node: &Node, resolve_date: &dyn Fn(&str) -> Option<DateTime<Utc>>) -> Term {
    let [left, op, right] = node.branches() else {
        return Term::Unsupported;
    };
    if !left.has_tag(TAG_OPERAND) || !right.has_tag(TAG_OPERAND) {
        return Term::Unsupported;
    }
    let name = left.name();
    if !name.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
        return Term::Unsupported;
    }
    let Some(op) = op.attribute("canonical") else {
        return Term::Unsupported;
    };

    let raw = right.name();
    let value = unquote(raw);
    let date = if DATE_ATTRIBUTES.contains(&name) {
        resolve_date(&value)
    } else {
        None
    };
    Term::Compare {
        name: name.to_string(),
        op: op.to_string(),
        value,
        date,
    }
}

fn text_modifier(name: &str, actual: &str, modifier: Option<&str>, value: &str) -> bool {
    if name == "id" {
        let same = actual.parse::<u64>().ok() == value.parse::<u64>().ok();
        return match modifier {
            None | Some("is" | "equals") => same,
            Some("isnt" | "not") => !same,
            _ => true,
        };
    }
    match modifier {
        None if value.is_empty() => actual.is_empty(),
        None => actual.starts_with(value),
        Some("is" | "equals") => actual == value,
        Some("isnt" | "not") => actual != value,
        Some("before" | "under" | "below") => actual < value,
        Some("after" | "over" | "above") => actual > value,
        Some("has" | "contains") => actual.contains(value),
        Some("hasnt") => !actual.contains(value),
        Some("none") => actual.is_empty(),
        Some("any") => !actual.is_empty(),
        Some(_) => true,
    }
}

fn attribute(task: &Task, name: &str) -> String {
    match name {
        "id" => task.id.unwrap_or(0).to_string(),
        "uuid" => task.uuid.to_string(),
        _ => task.get(name).unwrap_or_default().to_string(),
    }
}

fn id_ranges(text: &str) -> Option<Vec<(u64, u64)>> {
    text.split(',')
        .map(|part| match part.split_once('-') {
            Some((low, high)) => Some((low.parse().ok()?, high.parse().ok()?)),
            None => {
                let id = part.parse().ok()?;
                Some((id, id))
            }
        })
        .collect()
}

fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')));
    match inner {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::LegacyFilter;
    use crate::domain::{Schema, Task, TaskUuid};
    use crate::eval::NamedDates;
    use crate::filter::shadow::Oracle;
    use crate::filter::{parse_filter, FilterSource};
    use chrono::{FixedOffset, TimeZone, Utc};

    fn legacy(input: &str) -> LegacyFilter {
        let offset = FixedOffset::east_opt(0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let filter = parse_filter(input, &Schema::builtin()).unwrap();
        LegacyFilter::new(filter.tree(), &NamedDates::new(now, offset), offset)
    }

    fn task(id: Option<u64>, project: &str, tags: &[&str]) -> Task {
        let mut task = Task::new(TaskUuid::new());
        task.id = id;
        task.set("project", project).unwrap();
        task.set("description", "buy milk").unwrap();
        for tag in tags {
            task.add_tag(tag);
        }
        task
    }

    #[test]
    fn attribute_terms() {
        let home = task(Some(1), "Home.Garden", &[]);
        assert!(legacy("project:Home").eval_filter(&home));
        assert!(!legacy("project.is:Home").eval_filter(&home));
        assert!(legacy("project.has:Gard").eval_filter(&home));
        assert!(legacy("priority.none:").eval_filter(&home));
    }

    #[test]
    fn ids_tags_and_words() {
        let pending = task(Some(2), "Home", &["urgent"]);
        let completed = task(None, "Home", &[]);
        assert!(legacy("1-3").eval_filter(&pending));
        assert!(!legacy("1-3").eval_filter(&completed));
        assert!(legacy("+urgent milk").eval_filter(&pending));
        assert!(legacy("-urgent").eval_filter(&completed));
    }

    #[test]
    fn boolean_structure() {
        let home = task(Some(1), "Home", &[]);
        assert!(legacy("project:Work or project:Home").eval_filter(&home));
        assert!(!legacy("not project:Home").eval_filter(&home));
        assert!(legacy("( project:Work or +none ) or project:Home").eval_filter(&home));
        assert!(!legacy("project:Home xor milk").eval_filter(&home));
    }

    #[test]
    fn dates_and_infix() {
        let mut due = task(Some(1), "Home", &[]);
        let when = Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap();
        due.set("due", when.timestamp().to_string()).unwrap();
        assert!(legacy("due.before:eom").eval_filter(&due));
        assert!(!legacy("due.after:eom").eval_filter(&due));
        assert!(legacy("due:2024-01-20").eval_filter(&due));
        assert!(legacy("project == Home").eval_filter(&due));
        assert!(!legacy("project != Home").eval_filter(&due));
    }
}
