use std::path::Path;

use plsql2pg::prelude::*;
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path).expect("Failed to read fixture")
}

fn translate_fixture(name: &str, wrap: WrapMode) -> Translation {
    let options = GenerateOptions {
        wrap,
        ..GenerateOptions::default()
    };
    translate(&fixture(name), &DialectMapping::oracle_defaults(), &options)
        .expect("Failed to translate fixture")
}

#[test]
fn test_orders_trigger_as_function() {
    let out = translate_fixture("orders_biu.sql", WrapMode::Function);
    assert_eq!(
        out.sql,
        "CREATE OR REPLACE FUNCTION trg_orders_biu_fn()
RETURNS trigger
LANGUAGE plpgsql
AS $$
DECLARE
    v_total numeric(12, 2) := 0;
    c_max_qty CONSTANT integer := 1000;
    v_note varchar(200) := 'it''s -- not a comment';
    -- exception e_too_many: raised as SQLSTATE P0001 (raise_exception)
BEGIN
    IF (TG_OP = 'INSERT') THEN
        SELECT nextval('order_seq') INTO NEW.id;
        NEW.created_at := LOCALTIMESTAMP(0);
    ELSIF (TG_OP = 'UPDATE' AND NEW.status IS DISTINCT FROM OLD.status) THEN
        NEW.status_changed_at := LOCALTIMESTAMP(0);
    END IF;
    IF NEW.qty > c_max_qty THEN
        RAISE EXCEPTION 'e_too_many' USING ERRCODE = 'P0001';
    END IF;
    v_total := COALESCE(NEW.qty, 0) * COALESCE(NEW.unit_price, 0);
    NEW.total := v_total;
    NEW.updated_at := LOCALTIMESTAMP(0);
    RETURN NEW;
EXCEPTION
    WHEN raise_exception THEN
        RAISE EXCEPTION '%', 'quantity above ' || c_max_qty USING ERRCODE = 'P0001', DETAIL = 'ORA' || -20001;
    WHEN OTHERS THEN
        RAISE;
END;
$$;

CREATE OR REPLACE TRIGGER trg_orders_biu
    BEFORE INSERT OR UPDATE OF status, qty ON orders
    FOR EACH ROW
    EXECUTE FUNCTION trg_orders_biu_fn();
"
    );
    assert_eq!(out.statements_found, 11);
    assert_eq!(out.unit.stats().raw, 0);

    let diagnostics: Vec<_> = out.diagnostics.iter().collect();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].stage, Stage::Mapping);
    assert_eq!(diagnostics[0].path.as_deref(), Some("handler1"));
}

#[test]
fn test_audit_trigger_with_aliases() {
    let out = translate_fixture("audit_after.sql", WrapMode::Function);
    let meta = out.unit.metadata.as_ref().unwrap();
    assert_eq!(meta.name, "hr.trg_emp_audit");
    assert_eq!(meta.old_alias.as_deref(), Some("o"));

    assert!(out.sql.starts_with("CREATE OR REPLACE FUNCTION hr.trg_emp_audit_fn()\n"));
    assert!(out.sql.contains(
        "    CASE\n        WHEN (TG_OP = 'DELETE') THEN\n            v_action := 'DELETE';\n"
    ));
    assert!(out.sql.contains(
        "    INSERT INTO hr.audit_trail(emp_id, action, changed_at, changed_by) \
         VALUES (OLD.employee_id, v_action, CURRENT_TIMESTAMP, CURRENT_USER);\n"
    ));
    assert!(out.sql.contains("    RAISE NOTICE '%', 'audited ' || OLD.employee_id;\n"));
    assert!(out.sql.contains(
        "    -- untranslated statement, review:\n    COMMIT;\n    RETURN NULL;\nEND;\n"
    ));
    assert!(out.sql.ends_with(
        "CREATE OR REPLACE TRIGGER trg_emp_audit
    AFTER DELETE OR UPDATE ON hr.employees
    FOR EACH ROW
    WHEN (OLD.salary IS NOT NULL)
    EXECUTE FUNCTION hr.trg_emp_audit_fn();
"
    ));

    assert_eq!(out.statements_found, 6);
    assert_eq!(out.unit.stats().raw, 1);
    assert!(!out.diagnostics.has_errors());
}

#[test]
fn test_nested_control_flow() {
    let out = translate_fixture("nested.sql", WrapMode::Block);
    let expected = [
        "    c_bins CURSOR (p_item numeric) FOR SELECT bin_id, qty FROM inv.bins WHERE item_id = p_item ORDER BY bin_id;\n",
        "    v_left numeric := NEW.qty;\n",
        "    v_tries integer := 0;\n",
        "    <<bins>>\n    FOR b IN c_bins(NEW.item_id) LOOP\n",
        "        EXIT bins WHEN v_left <= 0;\n",
        "        v_left := v_left - LEAST(v_left, b.qty);\n",
        "    WHILE v_tries < 3 LOOP\n",
        "            UPDATE inv.items SET on_hand = on_hand + NEW.qty WHERE item_id = NEW.item_id;\n",
        "            IF NOT FOUND THEN\n",
        "                INSERT INTO inv.items(item_id, on_hand) VALUES (NEW.item_id, NEW.qty);\n",
        "            EXIT;\n",
        "        EXCEPTION\n            WHEN unique_violation THEN\n                NULL;\n        END;\n",
        "    FOR i IN REVERSE 3..1 LOOP\n        EXECUTE 'ANALYZE inv.items';\n",
    ];
    for line in expected {
        assert!(out.sql.contains(line), "missing {:?} in\n{}", line, out.sql);
    }
    assert!(!out.sql.contains("RECORD"));
    assert!(!out.sql.contains("RETURN"));

    assert_eq!(out.statements_found, 14);
    assert_eq!(out.unit.stats().raw, 0);
}

#[test]
fn test_missing_begin_fails_the_unit() {
    let err = translate(
        &fixture("unbalanced.sql"),
        &DialectMapping::oracle_defaults(),
        &GenerateOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        TranslateError::Structure {
            error: StructureError::MissingBegin { .. },
            ..
        }
    ));
    assert_eq!(err.line(), Some(4));
}

#[test]
fn test_unterminated_string_fails_the_unit() {
    let err = translate(
        "BEGIN v := 'open; END;",
        &DialectMapping::oracle_defaults(),
        &GenerateOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TranslateError::Lex(_)));
}

#[test]
fn test_every_statement_is_accounted_for() {
    for name in ["orders_biu.sql", "audit_after.sql", "nested.sql"] {
        let parsed = parse(&fixture(name)).unwrap();
        let stats = parsed.unit.stats();
        assert_eq!(stats.total(), parsed.statements_found, "{}", name);
    }
}

#[test]
fn test_string_literals_survive_translation() {
    let out = translate_fixture("orders_biu.sql", WrapMode::Block);
    assert!(out.sql.contains("'it''s -- not a comment'"));

    let out = translate_fixture("nested.sql", WrapMode::Block);
    assert!(out.sql.contains("'ANALYZE inv.items'"));
}

#[test]
fn test_translation_is_repeatable() {
    for name in ["orders_biu.sql", "audit_after.sql", "nested.sql"] {
        let a = translate_fixture(name, WrapMode::Function);
        let b = translate_fixture(name, WrapMode::Function);
        assert_eq!(a.sql, b.sql);
        assert_eq!(a.diagnostics, b.diagnostics);
        assert_eq!(a.unit.to_json().unwrap(), b.unit.to_json().unwrap());
    }
}

#[test]
fn test_deep_nesting() {
    let depth = 20;
    let src = format!("{}NULL;{}", "BEGIN ".repeat(depth), " END;".repeat(depth));
    let out = translate(&src, &DialectMapping::oracle_defaults(), &GenerateOptions::default())
        .unwrap();
    assert_eq!(out.statements_found, depth);
    assert!(out.sql.contains(&format!("\n{}NULL;\n", " ".repeat(4 * depth))));
    assert_eq!(out.sql.matches("END;").count(), depth);
}

#[test]
fn test_declare_and_if_else_parse() {
    let parsed =
        parse("DECLARE v_x NUMBER := 0; BEGIN IF v_x = 0 THEN v_x := 1; ELSE v_x := 2; END IF; END;")
            .unwrap();
    let unit = &parsed.unit;

    assert_eq!(unit.declarations.variables.len(), 1);
    let v = &unit.declarations.variables[0];
    assert_eq!(v.name, "v_x");
    assert_eq!(v.declared_type.name, "NUMBER");
    assert_eq!(v.default.as_ref().map(Initializer::to_sql).as_deref(), Some("0"));

    assert_eq!(unit.body.len(), 1);
    let Statement::If {
        then_branch,
        elsif_branches,
        else_branch,
        ..
    } = &unit.body[0]
    else {
        panic!("expected IF, got {:?}", unit.body[0]);
    };
    assert_eq!(then_branch.len(), 1);
    assert!(elsif_branches.is_empty());
    assert_eq!(else_branch.as_ref().map(Vec::len), Some(1));
    assert!(matches!(&then_branch[0], Statement::Assignment { expr, .. } if expr.text == "1"));
}

#[test]
fn test_inner_exception_section_stays_in_its_block() {
    let parsed = parse(
        "BEGIN
           BEGIN
             x := f();
           EXCEPTION
             WHEN no_data_found THEN y := 1;
           END;
         END;",
    )
    .unwrap();
    assert!(parsed.unit.exception_handlers.is_empty());
    let Statement::Block(block) = &parsed.unit.body[0] else {
        panic!("expected a nested block");
    };
    assert_eq!(block.handlers.len(), 1);
    assert_eq!(block.handlers[0].exception_name, "no_data_found");
}

#[test]
fn test_exception_declared_in_nested_block_keeps_outer_body() {
    let parsed = parse(
        "BEGIN
           DECLARE
             e_x EXCEPTION;
           BEGIN
             RAISE e_x;
           EXCEPTION
             WHEN e_x THEN NULL;
           END;
           y := 2;
         EXCEPTION
           WHEN OTHERS THEN NULL;
         END;",
    )
    .unwrap();
    let unit = &parsed.unit;
    assert_eq!(unit.body.len(), 2);
    let Statement::Block(block) = &unit.body[0] else {
        panic!("expected a nested block, got {:?}", unit.body[0]);
    };
    assert_eq!(block.declarations.as_ref().map(|d| d.exceptions.len()), Some(1));
    assert_eq!(block.handlers.len(), 1);
    assert!(matches!(&unit.body[1], Statement::Assignment { .. }));
    assert_eq!(unit.exception_handlers.len(), 1);
    assert!(unit.exception_handlers[0].is_others());
    assert!(parsed.diagnostics.is_empty());
}

#[test]
fn test_unparsed_handler_text_is_counted_and_kept() {
    let src = "BEGIN
                 NULL;
               EXCEPTION
                 log_it('lost?');
                 WHEN e_x NULL;
                 WHEN OTHERS THEN NULL;
               END;";
    let parsed = parse(src).unwrap();
    assert_eq!(parsed.unit.unparsed_handlers.len(), 2);
    assert_eq!(parsed.statements_found, 4);
    assert_eq!(parsed.unit.stats().total(), parsed.statements_found);
    assert_eq!(parsed.unit.stats().raw, 2);

    let out = translate(src, &DialectMapping::oracle_defaults(), &GenerateOptions::default())
        .unwrap();
    assert!(out.sql.contains("log_it('lost?');"));
    assert!(out.sql.contains("WHEN e_x NULL;"));
    assert!(out.diagnostics.has_errors());
    assert_eq!(out.diagnostics.for_stage(Stage::Handler).count(), 2);
}

#[test]
fn test_comment_markers_inside_strings_are_kept() {
    let parsed =
        parse("BEGIN SELECT COUNT(*) INTO v_n FROM t WHERE x = 1 AND y = '--not a comment'; END;")
            .unwrap();
    let Statement::Select(select) = &parsed.unit.body[0] else {
        panic!("expected SELECT");
    };
    assert!(select.sql.text.ends_with("WHERE x = 1 AND y = '--not a comment'"));
}

#[test]
fn test_custom_mapping_overrides_defaults() {
    let mapping = DialectMapping::from_toml_str(
        r#"
        [functions]
        NVL = "ifnull({0}, {1})"
        "#,
    )
    .unwrap();
    let out = translate(
        "BEGIN :new.x := NVL(:new.x, SYSDATE); END;",
        &mapping,
        &GenerateOptions::default(),
    )
    .unwrap();
    assert!(out.sql.contains("NEW.x := ifnull(NEW.x, LOCALTIMESTAMP(0));"));
}
