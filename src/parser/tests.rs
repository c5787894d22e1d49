use super::*;
use crate::ast::{DeclaredType, Fragment, Initializer, Statement};
use crate::error::StructureError;
use pretty_assertions::assert_eq;

fn parsed(src: &str) -> ParsedUnit {
    parse(src).unwrap()
}

#[test]
fn test_declare_and_if_else() {
    let p = parsed(
        "DECLARE v_x NUMBER := 0; BEGIN IF v_x = 0 THEN v_x := 1; ELSE v_x := 2; END IF; END;",
    );
    let unit = &p.unit;
    assert_eq!(unit.declarations.variables.len(), 1);
    let var = &unit.declarations.variables[0];
    assert_eq!(var.name, "v_x");
    assert_eq!(var.declared_type, DeclaredType::parse("NUMBER").unwrap());
    assert_eq!(var.default, Some(Initializer::Expr(Fragment::new("0", 22))));

    assert_eq!(unit.body.len(), 1);
    match &unit.body[0] {
        Statement::If {
            condition,
            then_branch,
            elsif_branches,
            else_branch,
        } => {
            assert_eq!(condition.text, "v_x = 0");
            assert!(elsif_branches.is_empty());
            assert_eq!(
                then_branch.as_slice(),
                &[Statement::Assignment {
                    target: Fragment::new("v_x", 47),
                    expr: Fragment::new("1", 54),
                }]
            );
            let else_branch = else_branch.as_ref().unwrap();
            assert_eq!(else_branch.len(), 1);
            match &else_branch[0] {
                Statement::Assignment { target, expr } => {
                    assert_eq!(target.text, "v_x");
                    assert_eq!(expr.text, "2");
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(p.diagnostics.is_empty());
    assert_eq!(p.statements_found, 3);
}

#[test]
fn test_inner_exception_stays_in_nested_block() {
    let p = parsed(
        "BEGIN v := 0; BEGIN x := f(); EXCEPTION WHEN no_data_found THEN y := 1; END; END;",
    );
    assert!(p.unit.exception_handlers.is_empty());
    assert_eq!(p.unit.body.len(), 2);
    match &p.unit.body[1] {
        Statement::Block(block) => {
            assert_eq!(block.body.len(), 1);
            assert_eq!(block.handlers.len(), 1);
            assert_eq!(block.handlers[0].exception_name, "no_data_found");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_comment_marker_inside_string_is_kept() {
    let p = parsed(
        "BEGIN SELECT COUNT(*) INTO v_n FROM t WHERE x = 1 AND y = '--not a comment'; END;",
    );
    match &p.unit.body[0] {
        Statement::Select(select) => assert_eq!(
            select.sql.text,
            "SELECT COUNT(*) INTO v_n FROM t WHERE x = 1 AND y = '--not a comment'"
        ),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_trigger_with_header_and_handlers() {
    let p = parsed(
        "CREATE OR REPLACE TRIGGER trg_orders_biu
         BEFORE INSERT OR UPDATE ON orders
         FOR EACH ROW
         DECLARE
           v_total NUMBER(12, 2);
         BEGIN
           IF INSERTING THEN
             :new.created_at := SYSDATE;
           END IF;
           :new.updated_at := SYSDATE;
         EXCEPTION
           WHEN OTHERS THEN
             RAISE;
         END trg_orders_biu;
         /",
    );
    let meta = p.unit.metadata.as_ref().unwrap();
    assert_eq!(meta.name, "trg_orders_biu");
    assert_eq!(meta.table, "orders");
    assert_eq!(p.unit.declarations.variables[0].declared_type.modifiers, vec!["12", "2"]);
    assert_eq!(p.unit.body.len(), 2);
    assert_eq!(p.unit.exception_handlers.len(), 1);
    assert!(p.diagnostics.is_empty());
    assert_eq!(p.statements_found, 4);
}

#[test]
fn test_counts_agree_with_raw_fallback() {
    let p = parsed(
        "BEGIN
           COMMIT;
           IF a THEN
             MERGE INTO t USING s ON (1 = 1);
             x := 1;
           END IF;
           IF b x := 2; END IF;
         EXCEPTION WHEN OTHERS THEN GOTO done;
         END;",
    );
    let stats = p.unit.stats();
    assert_eq!(stats.total(), p.statements_found);
    assert_eq!(stats.raw, 4);
    assert_eq!(stats.typed, 2);
}

#[test]
fn test_missing_terminal_end_warns() {
    let p = parsed("BEGIN x := 1;");
    assert_eq!(p.unit.body.len(), 1);
    assert_eq!(p.diagnostics.for_stage(Stage::Structure).count(), 1);
}

#[test]
fn test_structure_errors_are_fatal() {
    let err = parse("DECLARE v NUMBER;").unwrap_err();
    assert!(matches!(
        err,
        TranslateError::Structure {
            error: StructureError::MissingBegin { .. },
            ..
        }
    ));

    let err = parse("BEGIN x := 'open; END;").unwrap_err();
    assert!(matches!(err, TranslateError::Lex(_)));
}

#[test]
fn test_parse_is_deterministic() {
    let src = "DECLARE CURSOR c IS SELECT 1 FROM dual; BEGIN FOR r IN c LOOP NULL; END LOOP; END;";
    let a = parsed(src).unit.to_json().unwrap();
    let b = parsed(src).unit.to_json().unwrap();
    assert_eq!(a, b);
}
