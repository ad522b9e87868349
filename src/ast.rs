use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::EnumString, strum_macros::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    // `==` is the formula spelling, SQL only knows `=`
    #[strum(to_string = "=", serialize = "==")]
    Eq,
    #[strum(to_string = "!=", serialize = "<>")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(to_string = "AND", serialize = "&&")]
    And,
    #[strum(serialize = "OR")]
    Or,
    #[strum(to_string = "||", serialize = "&")]
    Concat,
}

impl BinaryOp {
    /// Relative binding strength in emitted SQL. Higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 10,
            BinaryOp::And => 20,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 40,
            BinaryOp::Concat => 45,
            BinaryOp::Add | BinaryOp::Sub => 50,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 60,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 40
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Literal {
    /// Decimal text exactly as written; validated before it reaches SQL.
    Number(String),
    String(String),
    Bool(bool),
    Null,
}

/// A parsed formula. Nodes are never mutated after construction: rewrites
///  build new nodes, so a tree can be compiled for several dialects at once.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn number(v: impl ToString) -> Self {
        Expr::Literal(Literal::Number(v.to_string()))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(v.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: callee.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Right-folds `items` into `a op (b op (c ...))`. Returns None for an
    ///  empty slice.
    pub fn fold_right(op: BinaryOp, items: &[Expr]) -> Option<Expr> {
        let (last, rest) = items.split_last()?;
        Some(
            rest.iter()
                .rev()
                .fold(last.clone(), |acc, item| Expr::binary(op, item.clone(), acc)),
        )
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Depth of the deepest path through the tree. Callers use this to reject
    ///  oversized formulas before compiling them.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Literal(_) | Expr::Identifier(_) => 1,
            Expr::Call { args, .. } => 1 + args.iter().map(Expr::depth).max().unwrap_or(0),
            Expr::Binary { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Literal::Number(n)) => write!(f, "{n}"),
            Expr::Literal(Literal::String(s)) => write!(f, "{s:?}"),
            Expr::Literal(Literal::Bool(b)) => write!(f, "{b}"),
            Expr::Literal(Literal::Null) => write!(f, "null"),
            Expr::Identifier(name) => write!(f, "{{{name}}}"),
            Expr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
        }
    }
}
