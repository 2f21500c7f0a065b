//! End-to-end lowering tests: whole programs in, verified LLVM IR out.

use inkwell::context::Context;
use slate_codegen::ast::{
    BinOp, Expr, FunctionDecl, IfStmt, InterfaceDecl, Item, Program, Prototype, Stmt, TypeRef,
    UnOp, VarDef, VarRef,
};
use slate_codegen::CodeGen;
use slate_common::{CodegenError, ErrorKind, Span};

const S: Span = Span { start: 0, end: 0 };

fn compile(items: Vec<Item>) -> Result<String, CodegenError> {
    let context = Context::create();
    let mut codegen = CodeGen::new(&context, "it", 0, None).unwrap();
    codegen.compile(&Program { items })?;
    Ok(codegen.get_llvm_ir())
}

fn ty(name: &str) -> TypeRef {
    TypeRef::new(name, S)
}

fn function(name: &str, params: &[(&str, &str)], ret: Option<&str>, body: Vec<Stmt>) -> Item {
    Item::Function(FunctionDecl {
        prototype: Prototype::new(
            name,
            params
                .iter()
                .map(|(p, t)| (p.to_string(), ty(t)))
                .collect(),
            ret.map(ty),
        ),
        body,
        span: S,
    })
}

fn interface(name: &str, properties: &[(&str, &str)], bases: &[&str]) -> Item {
    Item::Interface(InterfaceDecl {
        name: name.to_string(),
        properties: properties
            .iter()
            .map(|(p, t)| (p.to_string(), ty(t)))
            .collect(),
        bases: bases.iter().map(|b| b.to_string()).collect(),
        span: S,
    })
}

fn var(name: &str) -> Expr {
    Expr::Variable(VarRef::new(name, S))
}

fn field(base: &str, property: &str) -> Expr {
    Expr::Variable(VarRef::new(base, S).property(property, S))
}

fn num(text: &str) -> Expr {
    Expr::Number(text.to_string(), S)
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span: S,
    }
}

fn define(name: &str, type_name: Option<&str>, value: Expr) -> Expr {
    binary(
        BinOp::Assign,
        Expr::Define(VarDef {
            name: name.to_string(),
            ty: type_name.map(ty),
            span: S,
        }),
        value,
    )
}

fn call(callee: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: callee.to_string(),
        args,
        span: S,
    }
}

fn increment(operand: Expr) -> Expr {
    Expr::Unary {
        op: UnOp::Increment,
        operand: Box::new(operand),
        suffix: true,
        span: S,
    }
}

#[test]
fn whole_program_lowers_and_verifies() {
    // interface Point { x: i32, y: i32 }
    // interface Point3 extends Point { z: i32 }
    // fn add(a: i64, b: i64) -> i64 { return a + b; }
    // fn main() -> i32 {
    //     let p: Point = { x: 3, y: 4 };
    //     let sum: i64 = 0;
    //     for (let i: i64 = 0; i < 10; i++) { sum = sum + add(i, 1); }
    //     if (sum > 5) { p.x++; }
    //     return p.x;
    // }
    let ir = compile(vec![
        interface("Point", &[("x", "i32"), ("y", "i32")], &[]),
        interface("Point3", &[("z", "i32")], &["Point"]),
        function(
            "add",
            &[("a", "i64"), ("b", "i64")],
            Some("i64"),
            vec![Stmt::Return(Some(binary(BinOp::Plus, var("a"), var("b"))), S)],
        ),
        function(
            "main",
            &[],
            Some("i32"),
            vec![
                Stmt::Expr(define(
                    "p",
                    Some("Point"),
                    Expr::Object {
                        properties: vec![("x".to_string(), num("3")), ("y".to_string(), num("4"))],
                        span: S,
                    },
                )),
                Stmt::Expr(define("sum", Some("i64"), num("0"))),
                Stmt::For {
                    definition: Box::new(define("i", Some("i64"), num("0"))),
                    condition: Box::new(binary(BinOp::Lt, var("i"), num("10"))),
                    stepper: Box::new(increment(var("i"))),
                    body: vec![Stmt::Expr(binary(
                        BinOp::Assign,
                        var("sum"),
                        binary(BinOp::Plus, var("sum"), call("add", vec![var("i"), num("1")])),
                    ))],
                    span: S,
                },
                Stmt::If(IfStmt {
                    condition: binary(BinOp::Gt, var("sum"), num("5")),
                    then_body: Some(vec![Stmt::Expr(increment(field("p", "x")))]),
                    else_body: None,
                    span: S,
                }),
                Stmt::Return(Some(field("p", "x")), S),
            ],
        ),
    ])
    .unwrap();

    assert!(
        ir.contains("%interface.Point = type { i32, i32 }"),
        "{}",
        ir
    );
    assert!(
        ir.contains("%interface.Point3 = type { i32, i32, i32 }"),
        "base fields come first: {}",
        ir
    );
    assert!(ir.contains("define private i64 @add"), "{}", ir);
    assert!(ir.contains("define i32 @main"), "{}", ir);
    assert!(ir.contains("call i64 @add"), "{}", ir);
    assert!(ir.contains("loop_stepper:"), "{}", ir);
    assert!(ir.contains("after_loop:"), "{}", ir);
    assert!(
        ir.contains("getelementptr inbounds %interface.Point"),
        "field access goes through a struct GEP: {}",
        ir
    );
}

#[test]
fn extern_call_with_interned_string() {
    let mut printf = Prototype::new("printf", vec![("fmt".to_string(), ty("string"))], Some(ty("i32")));
    printf.is_extern = true;
    printf.is_variadic = true;

    let ir = compile(vec![
        Item::Prototype(printf),
        function(
            "main",
            &[],
            Some("i32"),
            vec![
                Stmt::Expr(call("printf", vec![Expr::Str("hello".to_string(), S)])),
                Stmt::Expr(call("printf", vec![Expr::Str("hello".to_string(), S)])),
                Stmt::Return(Some(num("0")), S),
            ],
        ),
    ])
    .unwrap();

    assert!(ir.contains("declare i32 @printf(ptr, ...)"), "{}", ir);
    assert!(ir.contains("call i32 (ptr, ...) @printf"), "{}", ir);
    let globals = ir.matches("@string.hello = ").count();
    assert_eq!(globals, 1, "equal literals share one global: {}", ir);
}

#[test]
fn inline_if_feeds_a_return() {
    let ir = compile(vec![function(
        "max",
        &[("a", "i64"), ("b", "i64")],
        Some("i64"),
        vec![Stmt::Return(
            Some(Expr::InlineIf {
                condition: Box::new(binary(BinOp::Gt, var("a"), var("b"))),
                then_value: Box::new(var("a")),
                else_value: Box::new(var("b")),
                span: S,
            }),
            S,
        )],
    )])
    .unwrap();
    assert!(ir.contains("phi i64"), "{}", ir);
    assert!(ir.contains("ret i64 %if_result"), "{}", ir);
}

#[test]
fn do_while_runs_the_body_first() {
    let ir = compile(vec![function(
        "f",
        &[],
        None,
        vec![
            Stmt::Expr(define("i", Some("i32"), num("0"))),
            Stmt::While {
                condition: binary(BinOp::Lt, var("i"), num("3")),
                body: vec![Stmt::Expr(increment(var("i")))],
                is_do_while: true,
                span: S,
            },
        ],
    )])
    .unwrap();
    assert!(ir.contains("br label %loop\n"), "{}", ir);
    assert!(ir.contains("loop_condition:"), "{}", ir);
}

#[test]
fn nested_loops_break_the_inner_one() {
    let ir = compile(vec![function(
        "f",
        &[],
        None,
        vec![Stmt::Loop {
            body: vec![
                Stmt::Loop {
                    body: vec![Stmt::Break(S)],
                    span: S,
                },
                Stmt::Break(S),
            ],
            span: S,
        }],
    )])
    .unwrap();
    // Two distinct after_loop blocks, so the inner break cannot have
    // targeted the outer loop's exit.
    assert!(ir.contains("after_loop:"), "{}", ir);
    assert!(ir.contains("after_loop1:"), "{}", ir);
}

#[test]
fn call_type_mismatch_reports_the_parameter() {
    let err = compile(vec![
        function("add", &[("a", "i64"), ("b", "i64")], Some("i64"), vec![
            Stmt::Return(Some(binary(BinOp::Plus, var("a"), var("b"))), S),
        ]),
        function(
            "main",
            &[],
            Some("i32"),
            vec![Stmt::Expr(call("add", vec![Expr::Bool(true, S), num("1")]))],
        ),
    ])
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
    assert_eq!(
        err.message,
        "Expected parameter \"a\" to be <i64>, got <bool> instead."
    );
}

#[test]
fn unknown_type_aborts_compilation() {
    let err = compile(vec![function(
        "f",
        &[],
        None,
        vec![Stmt::Expr(define("v", Some("vec3"), num("0")))],
    )])
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedSymbol);
    assert_eq!(err.message, "Type <vec3> not found.");
}

#[test]
fn return_mismatch_aborts_compilation() {
    let err = compile(vec![function(
        "f",
        &[],
        Some("i64"),
        vec![Stmt::Return(Some(Expr::Str("nope".to_string(), S)), S)],
    )])
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Type);
    assert_eq!(
        err.message,
        "Expected function to return <i64>, got <string> instead."
    );
}

#[test]
fn object_literal_through_a_base_chain() {
    // An object typed as the derived interface must supply the base
    // properties too, and they land in the base-first slots.
    let ir = compile(vec![
        interface("Named", &[("id", "i64")], &[]),
        interface("User", &[("age", "i32")], &["Named"]),
        function(
            "f",
            &[],
            Some("i64"),
            vec![
                Stmt::Expr(define(
                    "u",
                    Some("User"),
                    Expr::Object {
                        properties: vec![
                            ("age".to_string(), num("30")),
                            ("id".to_string(), num("7")),
                        ],
                        span: S,
                    },
                )),
                Stmt::Return(Some(field("u", "id")), S),
            ],
        ),
    ])
    .unwrap();
    assert!(ir.contains("%interface.User = type { i64, i32 }"), "{}", ir);

    let err = compile(vec![
        interface("Named", &[("id", "i64")], &[]),
        interface("User", &[("age", "i32")], &["Named"]),
        function(
            "f",
            &[],
            None,
            vec![Stmt::Expr(define(
                "u",
                Some("User"),
                Expr::Object {
                    properties: vec![("age".to_string(), num("30"))],
                    span: S,
                },
            ))],
        ),
    ])
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedSymbol);
    assert_eq!(err.message, "Property <id> is missing from interface <User>");
}

#[test]
fn null_literal_is_rejected() {
    let err = compile(vec![function(
        "f",
        &[],
        None,
        vec![Stmt::Expr(Expr::Null(S))],
    )])
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedOperation);
    assert_eq!(err.message, "Unsupported AST node!");
}

#[test]
fn casts_between_numeric_widths() {
    let ir = compile(vec![function(
        "f",
        &[("n", "i32")],
        Some("f64"),
        vec![Stmt::Return(
            Some(Expr::Cast {
                value: Box::new(var("n")),
                ty: ty("f64"),
                span: S,
            }),
            S,
        )],
    )])
    .unwrap();
    assert!(ir.contains("sitofp i32"), "{}", ir);
}
