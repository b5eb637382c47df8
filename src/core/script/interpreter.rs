use super::parser::{BinaryOp, Expr, Statement, StatementKind};
use super::value::ScriptValue;
use super::{ChartSink, ScriptError, ScriptLimits, ScriptOutput};
use crate::core::dataset::TabularDataset;
use serde_json::Map;

pub(super) type EvalResult = std::result::Result<ScriptValue, String>;

pub(super) struct Interpreter<'a> {
    pub(super) dataset: &'a TabularDataset,
    pub(super) sink: &'a mut dyn ChartSink,
    pub(super) limits: ScriptLimits,
    pub(super) output: String,
    pub(super) charts_drawn: usize,
    variables: Vec<(String, ScriptValue)>,
}

impl<'a> Interpreter<'a> {
    pub(super) fn new(
        dataset: &'a TabularDataset,
        sink: &'a mut dyn ChartSink,
        limits: ScriptLimits,
    ) -> Self {
        Self {
            dataset,
            sink,
            limits,
            output: String::new(),
            charts_drawn: 0,
            variables: Vec::new(),
        }
    }

    pub(super) fn execute(&mut self, statement: &Statement) -> Result<(), ScriptError> {
        let line = statement.line;
        match &statement.kind {
            StatementKind::Assign(name, expr) => {
                let value = self.eval(expr).map_err(|m| ScriptError::new(line, m))?;
                match self.variables.iter_mut().find(|(n, _)| n == name) {
                    Some((_, slot)) => *slot = value,
                    None => self.variables.push((name.clone(), value)),
                }
            }
            StatementKind::Expr(expr) => {
                self.eval(expr).map_err(|m| ScriptError::new(line, m))?;
            }
        }
        Ok(())
    }

    pub(super) fn finish(self) -> ScriptOutput {
        let mut variables = Map::new();
        for (name, value) in self.variables {
            if value != ScriptValue::Frame {
                variables.insert(name, value.to_json());
            }
        }
        ScriptOutput {
            output: self.output,
            variables,
        }
    }

    fn eval(&mut self, expr: &Expr) -> EvalResult {
        let value = self.eval_expr(expr)?;
        // 名稱與欄位在取得時已是既有的值
        if matches!(expr, Expr::Name(_) | Expr::Attribute(..)) {
            return Ok(value);
        }
        self.check_size(value)
    }

    fn check_size(&self, value: ScriptValue) -> EvalResult {
        if value.footprint() > self.limits.max_value_len {
            return Err(format!(
                "value exceeds {} elements or bytes",
                self.limits.max_value_len
            ));
        }
        Ok(value)
    }

    fn eval_expr(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Number(n) => Ok(ScriptValue::Number(*n)),
            Expr::Str(s) => Ok(ScriptValue::Str(s.clone())),
            Expr::Bool(b) => Ok(ScriptValue::Bool(*b)),
            Expr::Null => Ok(ScriptValue::Null),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(ScriptValue::List),
            Expr::Name(name) => self.lookup(name),
            Expr::Attribute(target, attr) => {
                let target = self.eval(target)?;
                self.attribute(target, attr)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(target, index)
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, args)
            }
            Expr::Negate(inner) => {
                let value = self.eval(inner)?;
                binary(BinaryOp::Mul, value, ScriptValue::Number(-1.0))
            }
            Expr::Not(inner) => {
                let value = self.eval(inner)?;
                map_elements(value, &|v| Ok(ScriptValue::Bool(!v.truthy())))
            }
            Expr::Binary(op @ (BinaryOp::And | BinaryOp::Or), left, right) => {
                let left = self.eval(left)?;
                // 純量時短路求值
                if left.is_scalar() {
                    match (op, left.truthy()) {
                        (BinaryOp::And, false) => return Ok(ScriptValue::Bool(false)),
                        (BinaryOp::Or, true) => return Ok(ScriptValue::Bool(true)),
                        _ => {}
                    }
                }
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
        }
    }

    fn lookup(&self, name: &str) -> EvalResult {
        if name == "df" {
            return Ok(ScriptValue::Frame);
        }
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| format!("name '{}' is not defined", name))
    }

    pub(super) fn column(&self, name: &str) -> EvalResult {
        self.dataset
            .column(name)
            .map(|cells| ScriptValue::List(cells.iter().map(ScriptValue::from_json).collect()))
            .ok_or_else(|| {
                format!(
                    "unknown column '{}' (available: {})",
                    name,
                    self.dataset.columns.join(", ")
                )
            })
    }

    fn attribute(&self, target: ScriptValue, attr: &str) -> EvalResult {
        match target {
            ScriptValue::Frame => self.column(attr),
            ScriptValue::Map(_) => target
                .get(attr)
                .cloned()
                .ok_or_else(|| format!("key '{}' not found", attr)),
            other => Err(format!(
                "{} has no attribute '{}'",
                other.type_name(),
                attr
            )),
        }
    }

    fn index(&self, target: ScriptValue, index: ScriptValue) -> EvalResult {
        match (target, index) {
            (ScriptValue::Frame, ScriptValue::Str(name)) => self.column(&name),
            (ScriptValue::Map(entries), ScriptValue::Str(key)) => entries
                .into_iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v)
                .ok_or_else(|| format!("key '{}' not found", key)),
            (ScriptValue::List(items), ScriptValue::List(mask)) => filter(items, mask),
            (ScriptValue::List(items), ScriptValue::Number(n)) => {
                let position = resolve_index(n, items.len())?;
                Ok(items[position].clone())
            }
            (ScriptValue::Str(s), ScriptValue::Number(n)) => {
                let chars: Vec<char> = s.chars().collect();
                let position = resolve_index(n, chars.len())?;
                Ok(ScriptValue::Str(chars[position].to_string()))
            }
            (target, index) => Err(format!(
                "cannot index {} with {}",
                target.type_name(),
                index.type_name()
            )),
        }
    }
}

fn resolve_index(n: f64, len: usize) -> Result<usize, String> {
    if n.fract() != 0.0 {
        return Err(format!("index {} is not an integer", n));
    }
    let i = n as i64;
    let position = if i < 0 { len as i64 + i } else { i };
    if position < 0 || position >= len as i64 {
        return Err(format!("index {} out of range for length {}", i, len));
    }
    Ok(position as usize)
}

pub(super) fn filter(items: Vec<ScriptValue>, mask: Vec<ScriptValue>) -> EvalResult {
    if items.len() != mask.len() {
        return Err(format!(
            "mask length {} does not match list length {}",
            mask.len(),
            items.len()
        ));
    }
    Ok(ScriptValue::List(
        items
            .into_iter()
            .zip(mask)
            .filter(|(_, keep)| keep.truthy())
            .map(|(item, _)| item)
            .collect(),
    ))
}

/// 對純量套用函式，對清單逐一套用
pub(super) fn map_elements(
    value: ScriptValue,
    f: &dyn Fn(&ScriptValue) -> EvalResult,
) -> EvalResult {
    match value {
        ScriptValue::List(items) => items
            .iter()
            .map(f)
            .collect::<Result<Vec<_>, _>>()
            .map(ScriptValue::List),
        other => f(&other),
    }
}

pub(super) fn binary(op: BinaryOp, left: ScriptValue, right: ScriptValue) -> EvalResult {
    match (left, right) {
        (ScriptValue::List(a), ScriptValue::List(b)) => {
            if a.len() != b.len() {
                return Err(format!(
                    "cannot combine lists of length {} and {}",
                    a.len(),
                    b.len()
                ));
            }
            a.into_iter()
                .zip(b)
                .map(|(x, y)| binary(op, x, y))
                .collect::<Result<Vec<_>, _>>()
                .map(ScriptValue::List)
        }
        (ScriptValue::List(a), b) if b.is_scalar() => a
            .into_iter()
            .map(|x| binary(op, x, b.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map(ScriptValue::List),
        (a, ScriptValue::List(b)) if a.is_scalar() => b
            .into_iter()
            .map(|y| binary(op, a.clone(), y))
            .collect::<Result<Vec<_>, _>>()
            .map(ScriptValue::List),
        (a, b) => scalar(op, a, b),
    }
}

fn scalar(op: BinaryOp, a: ScriptValue, b: ScriptValue) -> EvalResult {
    use ScriptValue::{Bool, Null, Number, Str};

    match op {
        BinaryOp::And => return Ok(Bool(a.truthy() && b.truthy())),
        BinaryOp::Or => return Ok(Bool(a.truthy() || b.truthy())),
        BinaryOp::Eq => return Ok(Bool(equal(&a, &b))),
        BinaryOp::NotEq => return Ok(Bool(!equal(&a, &b))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (&a, &b) {
                (Null, _) | (_, Null) => return Ok(Bool(false)),
                (Str(x), Str(y)) => x.cmp(y),
                (Number(_) | Bool(_), Number(_) | Bool(_)) => {
                    let (x, y) = (a.as_number(), b.as_number());
                    match (x, y) {
                        (Some(x), Some(y)) => match x.partial_cmp(&y) {
                            Some(ordering) => ordering,
                            None => return Ok(Bool(false)),
                        },
                        _ => return Ok(Bool(false)),
                    }
                }
                _ => {
                    return Err(format!(
                        "cannot compare {} with {}",
                        a.type_name(),
                        b.type_name()
                    ))
                }
            };
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::LtEq => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            return Ok(Bool(result));
        }
        _ => {}
    }

    match (&a, &b) {
        (Null, _) | (_, Null) => Ok(Null),
        (Str(_), _) | (_, Str(_)) if op == BinaryOp::Add => {
            Ok(Str(format!("{}{}", a, b)))
        }
        (Number(_) | Bool(_), Number(_) | Bool(_)) => {
            let x = a.as_number().unwrap_or(0.0);
            let y = b.as_number().unwrap_or(0.0);
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div | BinaryOp::Rem if y == 0.0 => {
                    return Err("division by zero".to_string())
                }
                BinaryOp::Div => x / y,
                _ => ((x % y) + y) % y,
            };
            Ok(Number(result))
        }
        _ => Err(format!(
            "unsupported operand types for {}: {} and {}",
            op_symbol(op),
            a.type_name(),
            b.type_name()
        )),
    }
}

fn equal(a: &ScriptValue, b: &ScriptValue) -> bool {
    match (a, b) {
        (ScriptValue::Number(x), ScriptValue::Number(y)) => x == y,
        (ScriptValue::Number(_), ScriptValue::Bool(_))
        | (ScriptValue::Bool(_), ScriptValue::Number(_)) => a.as_number() == b.as_number(),
        _ => a == b,
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        _ => "comparison",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[f64]) -> ScriptValue {
        ScriptValue::List(values.iter().map(|v| ScriptValue::Number(*v)).collect())
    }

    #[test]
    fn test_broadcasting() {
        let result = binary(BinaryOp::Mul, list(&[1.0, 2.0]), ScriptValue::Number(3.0)).unwrap();
        assert_eq!(result, list(&[3.0, 6.0]));

        let result = binary(BinaryOp::Sub, list(&[5.0, 5.0]), list(&[1.0, 2.0])).unwrap();
        assert_eq!(result, list(&[4.0, 3.0]));

        assert!(binary(BinaryOp::Add, list(&[1.0]), list(&[1.0, 2.0])).is_err());
    }

    #[test]
    fn test_string_concat_and_modulo() {
        let result = binary(
            BinaryOp::Add,
            ScriptValue::Str("n=".into()),
            ScriptValue::Number(4.0),
        )
        .unwrap();
        assert_eq!(result, ScriptValue::Str("n=4".into()));

        let result = binary(
            BinaryOp::Rem,
            ScriptValue::Number(-1.0),
            ScriptValue::Number(3.0),
        )
        .unwrap();
        assert_eq!(result, ScriptValue::Number(2.0));
    }

    #[test]
    fn test_comparisons_with_null_are_false() {
        let result = binary(
            BinaryOp::Gt,
            ScriptValue::List(vec![ScriptValue::Null, ScriptValue::Number(2.0)]),
            ScriptValue::Number(1.0),
        )
        .unwrap();
        assert_eq!(
            result,
            ScriptValue::List(vec![ScriptValue::Bool(false), ScriptValue::Bool(true)])
        );
        assert!(binary(
            BinaryOp::Lt,
            ScriptValue::Str("a".into()),
            ScriptValue::Number(1.0)
        )
        .is_err());
    }
}
