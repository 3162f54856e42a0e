//! 切点（Pointcut）表达式系统
//!
//! 定义了如何匹配连接点的规则。表达式语法：
//!
//! ```text
//! execution(<返回类型> [<类型>.]<方法>(<参数>))
//! within(<类型>)
//! ```
//!
//! 可以用 `&&`、`||`、`!` 和括号组合。
//!
//! - `*` 匹配一个名称段内的任意字符
//! - 类型模式中的 `..` 匹配任意多个包段，例如 `shop..*Service`
//! - 不含 `.` 的类型模式只和简单类型名比较，例如 `*Service`
//! - 参数列表：`()` 无参数，`(..)` 任意参数，`(*)` 恰好一个参数，
//!   `(Int, ..)` 第一个参数为 Int
//!
//! 类型模式匹配目标类型本身或它的任一父类型、接口。

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;
use weave_core::{MethodDescriptor, TypeDescriptor};

/// 切点
pub trait Pointcut: Send + Sync {
    /// 类型层面是否可能匹配
    fn matches_type(&self, target: &TypeDescriptor) -> bool;

    /// 目标类型上的某个方法是否匹配
    fn matches_method(&self, method: &MethodDescriptor, target: &TypeDescriptor) -> bool;
}

/// 切点表达式解析错误
#[derive(Debug, Error, PartialEq)]
#[error("invalid pointcut expression '{expression}' at offset {position}: {reason}")]
pub struct PointcutParseError {
    pub expression: String,
    pub position: usize,
    pub reason: String,
}

/// 名称通配模式
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    /// `None` 表示 `*`，匹配一切
    regex: Option<Regex>,
    /// 不含 `.` 的模式只和简单名比较
    simple_name: bool,
}

impl NamePattern {
    pub fn compile(source: &str) -> Result<Self, String> {
        if source.is_empty() {
            return Err("empty name pattern".to_string());
        }
        if source == "*" {
            return Ok(Self {
                source: source.to_string(),
                regex: None,
                simple_name: true,
            });
        }
        if let Some(c) = source
            .chars()
            .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '*')))
        {
            return Err(format!("unexpected character '{}' in pattern '{}'", c, source));
        }
        if source.starts_with('.') || source.ends_with('.') || source.contains("...") {
            return Err(format!("malformed pattern '{}'", source));
        }

        let chars: Vec<char> = source.chars().collect();
        let mut pattern = String::from("^");
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '.' if chars.get(i + 1) == Some(&'.') => {
                    pattern.push_str(r"(?:\.[^.]+)*\.");
                    i += 2;
                    continue;
                }
                '.' => pattern.push_str(r"\."),
                '*' => pattern.push_str("[^.]*"),
                c => pattern.push_str(&regex::escape(&c.to_string())),
            }
            i += 1;
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| e.to_string())?;
        Ok(Self {
            source: source.to_string(),
            regex: Some(regex),
            simple_name: !source.contains('.'),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        let Some(regex) = &self.regex else {
            return true;
        };
        let subject = if self.simple_name {
            name.rsplit('.').next().unwrap_or(name)
        } else {
            name
        };
        regex.is_match(subject)
    }

    /// 目标类型或它的任一父类型、接口匹配
    fn matches_type_closure(&self, target: &TypeDescriptor) -> bool {
        target
            .type_closure()
            .iter()
            .any(|key| self.matches(key.as_str()))
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// 参数列表模式
#[derive(Debug, Clone)]
pub struct ParamsPattern {
    items: Vec<NamePattern>,
    /// 以 `..` 结尾，之后可以有任意多个参数
    rest: bool,
}

impl ParamsPattern {
    fn compile(source: &str) -> Result<Self, String> {
        let source = source.trim();
        if source.is_empty() {
            return Ok(Self {
                items: Vec::new(),
                rest: false,
            });
        }

        let parts: Vec<&str> = source.split(',').map(str::trim).collect();
        let mut items = Vec::new();
        let mut rest = false;
        for (idx, part) in parts.iter().enumerate() {
            if *part == ".." {
                if idx + 1 != parts.len() {
                    return Err("'..' is only allowed as the last parameter".to_string());
                }
                rest = true;
            } else {
                items.push(NamePattern::compile(part)?);
            }
        }
        Ok(Self { items, rest })
    }

    fn matches(&self, method: &MethodDescriptor) -> bool {
        use weave_core::Signature;

        let params = method.params();
        let arity_ok = if self.rest {
            params.len() >= self.items.len()
        } else {
            params.len() == self.items.len()
        };
        arity_ok
            && self
                .items
                .iter()
                .zip(params)
                .all(|(pattern, param)| pattern.matches(&param.to_string()))
    }
}

/// 切点表达式
#[derive(Debug, Clone)]
pub enum PointcutExpression {
    /// execution(* shop.OrderService.place(..))
    Execution {
        returns: NamePattern,
        declaring_type: Option<NamePattern>,
        method: NamePattern,
        params: ParamsPattern,
    },

    /// within(shop..*)
    Within(NamePattern),

    /// 与运算（AND）
    And(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 或运算（OR）
    Or(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 非运算（NOT）
    Not(Box<PointcutExpression>),
}

impl PointcutExpression {
    pub fn parse(expression: &str) -> Result<Self, PointcutParseError> {
        Parser::new(expression).parse()
    }

    /// 类型层面的预筛选
    ///
    /// 对 `!` 保守地返回 true，精确结果由 [`matches_method`](Self::matches_method) 决定
    pub fn matches_type(&self, target: &TypeDescriptor) -> bool {
        match self {
            PointcutExpression::Execution { declaring_type, .. } => declaring_type
                .as_ref()
                .map_or(true, |pattern| pattern.matches_type_closure(target)),
            PointcutExpression::Within(pattern) => pattern.matches_type_closure(target),
            PointcutExpression::And(left, right) => {
                left.matches_type(target) && right.matches_type(target)
            }
            PointcutExpression::Or(left, right) => {
                left.matches_type(target) || right.matches_type(target)
            }
            PointcutExpression::Not(_) => true,
        }
    }

    pub fn matches_method(&self, method: &MethodDescriptor, target: &TypeDescriptor) -> bool {
        match self {
            PointcutExpression::Execution {
                returns,
                declaring_type,
                method: name,
                params,
            } => {
                declaring_type
                    .as_ref()
                    .map_or(true, |pattern| pattern.matches_type_closure(target))
                    && name.matches(method.name())
                    && returns.matches(&method.returns().to_string())
                    && params.matches(method)
            }
            PointcutExpression::Within(pattern) => pattern.matches_type_closure(target),
            PointcutExpression::And(left, right) => {
                left.matches_method(method, target) && right.matches_method(method, target)
            }
            PointcutExpression::Or(left, right) => {
                left.matches_method(method, target) || right.matches_method(method, target)
            }
            PointcutExpression::Not(expr) => !expr.matches_method(method, target),
        }
    }

    /// 与运算
    pub fn and(self, other: PointcutExpression) -> Self {
        PointcutExpression::And(Box::new(self), Box::new(other))
    }

    /// 或运算
    pub fn or(self, other: PointcutExpression) -> Self {
        PointcutExpression::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        PointcutExpression::Not(Box::new(self))
    }
}

impl fmt::Display for PointcutExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointcutExpression::Execution {
                returns,
                declaring_type,
                method,
                params,
            } => {
                write!(f, "execution({} ", returns)?;
                if let Some(ty) = declaring_type {
                    write!(f, "{}.", ty)?;
                }
                let mut items: Vec<String> = params.items.iter().map(|p| p.to_string()).collect();
                if params.rest {
                    items.push("..".to_string());
                }
                write!(f, "{}({}))", method, items.join(", "))
            }
            PointcutExpression::Within(pattern) => write!(f, "within({})", pattern),
            PointcutExpression::And(l, r) => write!(f, "({} && {})", l, r),
            PointcutExpression::Or(l, r) => write!(f, "({} || {})", l, r),
            PointcutExpression::Not(e) => write!(f, "!{}", e),
        }
    }
}

impl FromStr for PointcutExpression {
    type Err = PointcutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// 基于表达式的切点
#[derive(Debug, Clone)]
pub struct ExpressionPointcut {
    source: String,
    expression: PointcutExpression,
}

impl ExpressionPointcut {
    pub fn parse(source: &str) -> Result<Self, PointcutParseError> {
        Ok(Self {
            source: source.to_string(),
            expression: PointcutExpression::parse(source)?,
        })
    }

    /// 原始表达式文本
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expression(&self) -> &PointcutExpression {
        &self.expression
    }
}

impl Pointcut for ExpressionPointcut {
    fn matches_type(&self, target: &TypeDescriptor) -> bool {
        self.expression.matches_type(target)
    }

    fn matches_method(&self, method: &MethodDescriptor, target: &TypeDescriptor) -> bool {
        self.expression.matches_method(method, target)
    }
}

/// 递归下降解析器
struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn parse(mut self) -> Result<PointcutExpression, PointcutParseError> {
        let expression = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.source.len() {
            return Err(self.error(self.pos, "unexpected trailing input"));
        }
        Ok(expression)
    }

    fn error(&self, position: usize, reason: impl Into<String>) -> PointcutParseError {
        PointcutParseError {
            expression: self.source.to_string(),
            position,
            reason: reason.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.source.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<PointcutExpression, PointcutParseError> {
        let mut left = self.parse_and()?;
        while self.eat("||") {
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<PointcutExpression, PointcutParseError> {
        let mut left = self.parse_unary()?;
        while self.eat("&&") {
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<PointcutExpression, PointcutParseError> {
        if self.eat("!") {
            return Ok(self.parse_unary()?.not());
        }
        if self.eat("(") {
            let inner = self.parse_or()?;
            if !self.eat(")") {
                return Err(self.error(self.pos, "expected ')'"));
            }
            return Ok(inner);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<PointcutExpression, PointcutParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let keyword: String = self
            .rest()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        if keyword.is_empty() {
            return Err(self.error(start, "expected 'execution' or 'within'"));
        }
        self.pos += keyword.len();

        if !self.eat("(") {
            return Err(self.error(self.pos, format!("expected '(' after '{}'", keyword)));
        }
        let body_start = self.pos;
        let body = self.read_balanced()?;

        let parsed = match keyword.as_str() {
            "execution" => parse_execution(body),
            "within" => NamePattern::compile(body.trim()).map(PointcutExpression::Within),
            other => Err(format!("unknown designator '{}'", other)),
        };
        parsed.map_err(|reason| self.error(body_start, reason))
    }

    /// 读取到与已消费的 `(` 配对的 `)` 为止，返回中间的文本
    fn read_balanced(&mut self) -> Result<&'a str, PointcutParseError> {
        let start = self.pos;
        let mut depth = 1;
        for (offset, c) in self.rest().char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = &self.source[start..start + offset];
                        self.pos = start + offset + 1;
                        return Ok(body);
                    }
                }
                _ => {}
            }
        }
        Err(self.error(start, "unclosed '('"))
    }
}

/// 解析 `<返回类型> [<类型>.]<方法>(<参数>)`
fn parse_execution(body: &str) -> Result<PointcutExpression, String> {
    let body = body.trim();
    let (returns, signature) = body
        .split_once(char::is_whitespace)
        .ok_or_else(|| "expected '<return type> <method>(<params>)'".to_string())?;
    let signature = signature.trim();

    let open = signature
        .find('(')
        .ok_or_else(|| "missing parameter list".to_string())?;
    if !signature.ends_with(')') {
        return Err("parameter list must close the signature".to_string());
    }
    let declaration = signature[..open].trim();
    let params = &signature[open + 1..signature.len() - 1];

    let (declaring_type, method) = match declaration.rsplit_once('.') {
        Some((ty, method)) if ty.ends_with('.') => {
            (Some(NamePattern::compile(&format!("{}.*", ty))?), method)
        }
        Some((ty, method)) => (Some(NamePattern::compile(ty)?), method),
        None => (None, declaration),
    };

    Ok(PointcutExpression::Execution {
        returns: NamePattern::compile(returns)?,
        declaring_type,
        method: NamePattern::compile(method)?,
        params: ParamsPattern::compile(params)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use weave_core::{ParamType, Value};

    fn types() -> (Arc<TypeDescriptor>, Arc<TypeDescriptor>) {
        let api = TypeDescriptor::interface("shop.api.OrderService")
            .abstract_method("place", vec![ParamType::Str, ParamType::Int], ParamType::Int)
            .build();
        let service = TypeDescriptor::class("shop.impl.DefaultOrderService")
            .implements(&api)
            .method(
                "place",
                vec![ParamType::Str, ParamType::Int],
                ParamType::Int,
                |_, _| Ok(Value::Int(1)),
            )
            .method("audit", vec![], ParamType::Void, |_, _| Ok(Value::Null))
            .build();
        let other = TypeDescriptor::class("billing.Invoice")
            .method("total", vec![], ParamType::Float, |_, _| Ok(Value::Float(0.0)))
            .build();
        (service, other)
    }

    fn method<'a>(ty: &'a TypeDescriptor, name: &str) -> &'a MethodDescriptor {
        ty.all_methods().into_iter().find(|m| m.name() == name).unwrap()
    }

    #[test]
    fn test_execution_matches_through_interface() {
        let (service, other) = types();
        let pointcut =
            ExpressionPointcut::parse("execution(* shop.api.OrderService.place(..))").unwrap();
        assert!(pointcut.matches_type(&service));
        assert!(!pointcut.matches_type(&other));
        assert!(pointcut.matches_method(method(&service, "place"), &service));
        assert!(!pointcut.matches_method(method(&service, "audit"), &service));
    }

    #[test]
    fn test_wildcards_and_packages() {
        let (service, _) = types();
        let place = method(&service, "place");
        for expr in [
            "execution(* shop..*(..))",
            "execution(Int *Service.pl*(Str, ..))",
            "execution(* *(Str, *))",
            "within(shop..*)",
        ] {
            assert!(
                ExpressionPointcut::parse(expr).unwrap().matches_method(place, &service),
                "{} should match",
                expr
            );
        }
        for expr in [
            "execution(Void shop..*.place(..))",
            "execution(* *.place())",
            "execution(* *(Int, ..))",
            "within(billing.*)",
        ] {
            assert!(
                !ExpressionPointcut::parse(expr).unwrap().matches_method(place, &service),
                "{} should not match",
                expr
            );
        }
    }

    #[test]
    fn test_boolean_operators() {
        let (service, other) = types();
        let pointcut = ExpressionPointcut::parse(
            "(within(shop..*) || within(billing.*)) && !execution(* audit())",
        )
        .unwrap();
        assert!(pointcut.matches_method(method(&service, "place"), &service));
        assert!(!pointcut.matches_method(method(&service, "audit"), &service));
        assert!(pointcut.matches_method(method(&other, "total"), &other));
    }

    #[test]
    fn test_parse_errors() {
        for expr in [
            "",
            "execution(* place(..)",
            "execution(place(..))",
            "within(shop..*) &&",
            "call(* *(..))",
            "execution(* a.b(.., Int))",
            "within(shop.#)",
            "within(a) within(b)",
        ] {
            assert!(PointcutExpression::parse(expr).is_err(), "{} should fail", expr);
        }
        let err = PointcutExpression::parse("within(x) || nope(y)").unwrap_err();
        assert_eq!(err.reason, "unknown designator 'nope'");
    }

    #[test]
    fn test_display_round_trips_structure() {
        let expr =
            PointcutExpression::parse("!within(shop..*) || execution(* *.run(Int, ..))").unwrap();
        assert_eq!(expr.to_string(), "(!within(shop..*) || execution(* *.run(Int, ..)))");
    }
}
