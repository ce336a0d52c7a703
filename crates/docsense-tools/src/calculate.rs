//! Arithmetic tool: evaluate `+ - * /` expressions with parentheses.
//!
//! Failures (syntax errors, division by zero) are reported in the tool
//! text so the model can react; only missing parameters are transport
//! errors.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::Tool;

pub struct CalculateTool;

impl CalculateTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalculateTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression with + - * /, parentheses and \
         unary minus, e.g. \"3 + 4 * 2\"."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": { "type": "string", "description": "Arithmetic expression to evaluate." }
            },
            "required": ["expression"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<String> {
        let expression = params["expression"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing required parameter: expression"))?;
        match eval(expression) {
            Ok(v) => Ok(format_number(v)),
            Err(e) => Ok(format!("calculation failed: {e}")),
        }
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Recursive-descent evaluator.
///
///   expr   := term (('+' | '-') term)*
///   term   := factor (('*' | '/') factor)*
///   factor := '-' factor | number | '(' expr ')'
pub fn eval(input: &str) -> Result<f64, String> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(format!("unexpected character '{}'", parser.chars[parser.pos]));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut acc = self.term()?;
        loop {
            if self.eat('+') {
                acc += self.term()?;
            } else if self.eat('-') {
                acc -= self.term()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut acc = self.factor()?;
        loop {
            if self.eat('*') {
                acc *= self.factor()?;
            } else if self.eat('/') {
                let divisor = self.factor()?;
                if divisor == 0.0 {
                    return Err("division by zero".to_string());
                }
                acc /= divisor;
            } else {
                return Ok(acc);
            }
        }
    }

    fn factor(&mut self) -> Result<f64, String> {
        self.skip_ws();
        if self.eat('-') {
            return Ok(-self.factor()?);
        }
        if self.eat('(') {
            let value = self.expr()?;
            if !self.eat(')') {
                return Err("missing closing parenthesis".to_string());
            }
            return Ok(value);
        }
        self.number()
    }

    fn number(&mut self) -> Result<f64, String> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(match self.peek() {
                Some(c) => format!("expected a number, found '{c}'"),
                None => "unexpected end of expression".to_string(),
            });
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>().map_err(|_| format!("invalid number '{text}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(eval("3 + 4 * 2").unwrap(), 11.0);
        assert_eq!(eval("(3 + 4) * 2").unwrap(), 14.0);
        assert_eq!(eval("10 / 4").unwrap(), 2.5);
        assert_eq!(eval("2 - 3 - 4").unwrap(), -5.0);
    }

    #[test]
    fn unary_minus() {
        assert_eq!(eval("-3 + 5").unwrap(), 2.0);
        assert_eq!(eval("2 * -(1 + 1)").unwrap(), -4.0);
        assert_eq!(eval("--2").unwrap(), 2.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(eval("3 +").is_err());
        assert!(eval("(1 + 2").is_err());
        assert!(eval("1 2").is_err());
        assert!(eval("abc").is_err());
        assert!(eval("1.2.3").is_err());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(eval("1 / 0").unwrap_err(), "division by zero");
    }

    #[tokio::test]
    async fn tool_reports_failures_as_text() {
        let tool = CalculateTool::new();
        let ok = tool
            .invoke(serde_json::json!({ "expression": "3 + 4 * 2" }))
            .await
            .unwrap();
        assert_eq!(ok, "11");

        let bad = tool
            .invoke(serde_json::json!({ "expression": "1 / 0" }))
            .await
            .unwrap();
        assert_eq!(bad, "calculation failed: division by zero");
    }
}
