//! End-to-end generation runs over temporary Go modules.

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wirego::{CodegenError, GeneratorConfig, WriteOutcome};

const HEADER: &str = "// Code generated by wirego. DO NOT EDIT.\n\
                      // Run wirego from the module root to regenerate.\n";

fn module(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("go.mod"), "module example.com/shop\n\ngo 1.22\n")
        .expect("Failed to write go.mod");
    for (path, content) in files {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().expect("parent")).expect("Failed to create dir");
        fs::write(path, content).expect("Failed to write source");
    }
    dir
}

fn directives(body: &str) -> String {
    format!(
        "//go:build exclude\n\npackage shop\n\nimport \"example.com/shop/di\"\n\nfunc build() {{\n{body}}}\n"
    )
}

fn generated(root: &Path) -> String {
    fs::read_to_string(root.join("di_generated.go")).expect("Failed to read generated unit")
}

fn run(root: &Path) -> wirego::RunReport {
    let config = GeneratorConfig::builder().root(root).without_env().build();
    wirego::run(&config).expect("Failed to run generation")
}

#[test]
fn test_primitive_record_and_idempotence() {
    let dir = module(&[
        ("db.go", "package shop\n\ntype Db struct {\n\tdsn string\n}\n"),
        ("di.go", directives("\tdi.Build(Db{})\n").as_str()),
    ]);

    let first = run(dir.path());
    assert_eq!(first.written(), 1);
    assert_eq!(
        generated(dir.path()),
        format!(
            "{HEADER}\npackage shop\n\n\
             func NewDb(dsn string) (db *Db) {{\n\
             \tdb = &Db{{\n\
             \t\tdsn: dsn,\n\
             \t}}\n\
             \treturn\n\
             }}\n"
        )
    );

    let second = run(dir.path());
    assert_eq!(second.written(), 0);
    assert_eq!(second.count(WriteOutcome::Unchanged), 1);
}

#[test]
fn test_bind_pointer_receiver_is_injected_by_address() {
    let dir = module(&[
        (
            "writer.go",
            r#"package shop

type Writer interface {
	Write(p []byte) (int, error)
}

type FileWriter struct {
	path string
}

func (w *FileWriter) Write(p []byte) (int, error) {
	return len(p), nil
}

type Logger struct {
	Out    Writer
	prefix string
}
"#,
        ),
        (
            "di.go",
            directives("\tdi.Bind(Writer, FileWriter{})\n\tdi.Build(Logger{})\n").as_str(),
        ),
    ]);

    run(dir.path());
    let content = generated(dir.path());
    assert!(content.contains(
        "func NewLogger(path string, prefix string) (logger *Logger) {\n\
         \tfileWriter := FileWriter{\n\
         \t\tpath: path,\n\
         \t}\n\
         \tlogger = &Logger{\n\
         \t\tOut:    &fileWriter,\n\
         \t\tprefix: prefix,\n\
         \t}\n\
         \treturn\n\
         }\n"
    ));
    assert!(content.contains(
        "func NewWriter(path string) (writer Writer) {\n\
         \twriter = &FileWriter{\n\
         \t\tpath: path,\n\
         \t}\n\
         \treturn\n\
         }\n"
    ));
}

#[test]
fn test_bind_env_selects_implementation() {
    let dir = module(&[
        (
            "service.go",
            r#"package shop

type Servicer interface {
	Serve() string
}

type DefaultImpl struct{}

func (d DefaultImpl) Serve() string { return "default" }

type TestImpl struct{}

func (t TestImpl) Serve() string { return "test" }
"#,
        ),
        (
            "di.go",
            directives(
                "\tdi.Bind(Servicer, DefaultImpl{})\n\tdi.BindEnv(Servicer, TestImpl{}, \"test\")\n",
            )
            .as_str(),
        ),
    ]);

    run(dir.path());
    assert!(generated(dir.path()).contains(
        "func NewServicer() (servicer Servicer) {\n\tservicer = DefaultImpl{}\n\treturn\n}\n"
    ));

    let config = GeneratorConfig::builder().root(dir.path()).env("test").build();
    let report = wirego::run(&config).expect("Failed to run generation");
    assert_eq!(report.written(), 1);
    assert!(generated(dir.path()).contains(
        "func NewServicer() (servicer Servicer) {\n\tservicer = TestImpl{}\n\treturn\n}\n"
    ));
}

#[test]
fn test_shared_values_are_substituted() {
    let dir = module(&[
        (
            "app.go",
            r#"package shop

type Config struct {
	Name string
}

type Db struct {
	dsn string
}

func OpenDb(dsn string) *Db {
	return &Db{dsn: dsn}
}

type App struct {
	Cfg Config
	Db  *Db
}
"#,
        ),
        (
            "di.go",
            directives(
                "\tdi.Share(Config{}, Config{Name: \"shop\"})\n\tdi.Share(Db{}, OpenDb(\"postgres://\"))\n\tdi.Build(App{})\n",
            )
            .as_str(),
        ),
    ]);

    run(dir.path());
    assert_eq!(
        generated(dir.path()),
        format!(
            "{HEADER}\npackage shop\n\n\
             var (\n\
             \tdb = OpenDb(\"postgres://\")\n\
             )\n\n\
             func NewApp() (app *App) {{\n\
             \tapp = &App{{\n\
             \t\tCfg: Config{{Name: \"shop\"}},\n\
             \t\tDb:  db,\n\
             \t}}\n\
             \treturn\n\
             }}\n"
        )
    );
}

#[test]
fn test_singleton_accessor_is_used() {
    let dir = module(&[
        (
            "cache.go",
            r#"package shop

type Redis struct {
	addr string
}

func NewRedis() *Redis {
	return &Redis{addr: "localhost:6379"}
}

type Cache struct {
	R *Redis
}
"#,
        ),
        (
            "di.go",
            directives("\tdi.Singleton(Redis{}, NewRedis())\n\tdi.Build(Cache{})\n").as_str(),
        ),
    ]);

    run(dir.path());
    let content = generated(dir.path());
    assert!(content.contains("import \"sync\"\n"));
    assert!(content.contains("\tvar redisOnce sync.Once\n"));
    assert!(content.contains("var GetRedis = diSingleton()\n"));
    assert!(content.contains(
        "func NewCache() (cache *Cache) {\n\
         \tredis := GetRedis()\n\
         \tcache = &Cache{\n\
         \t\tR: redis,\n\
         \t}\n\
         \treturn\n\
         }\n"
    ));
}

#[test]
fn test_keyed_binding_switches_on_name() {
    let dir = module(&[
        (
            "notify.go",
            r#"package shop

type Notification interface {
	Send(msg string) error
}

type SmsNotification struct{}

func (s SmsNotification) Send(msg string) error { return nil }

type EmailNotification struct {
	from string
}

func (e *EmailNotification) Send(msg string) error { return nil }
"#,
        ),
        (
            "di.go",
            directives(
                "\tdi.Bind(Notification, map[string]any{\n\t\t\"sms\":   SmsNotification{},\n\t\t\"email\": EmailNotification{},\n\t})\n",
            )
            .as_str(),
        ),
    ]);

    run(dir.path());
    assert!(generated(dir.path()).contains(
        "func NewNotification(name string, from string) (notification Notification) {\n\
         \tswitch name {\n\
         \tcase \"email\":\n\
         \t\tnotification = &EmailNotification{\n\
         \t\t\tfrom: from,\n\
         \t\t}\n\
         \tcase \"sms\":\n\
         \t\tnotification = SmsNotification{}\n\
         \t}\n\
         \treturn\n\
         }\n"
    ));
}

#[test]
fn test_cross_package_constructor_is_forwarded() {
    let dir = module(&[
        ("store/repo.go", "package store\n\ntype Repo struct {\n\tdsn string\n}\n"),
        (
            "handler.go",
            r#"package shop

import "example.com/shop/store"

type Handler struct {
	Repo *store.Repo
	name string
}
"#,
        ),
        ("di.go", directives("\tdi.Build(Handler{})\n").as_str()),
    ]);

    let report = run(dir.path());
    assert_eq!(report.written(), 2);
    assert_eq!(
        generated(dir.path()),
        format!(
            "{HEADER}\npackage shop\n\n\
             import \"example.com/shop/store\"\n\n\
             func NewHandler(dsn string, name string) (handler *Handler) {{\n\
             \trepo := store.NewRepo(dsn)\n\
             \thandler = &Handler{{\n\
             \t\tRepo: repo,\n\
             \t\tname: name,\n\
             \t}}\n\
             \treturn\n\
             }}\n"
        )
    );
    assert!(generated(&dir.path().join("store")).contains(
        "func NewRepo(dsn string) (repo *Repo) {\n"
    ));
}

#[test]
fn test_factory_errors_are_propagated() {
    let dir = module(&[
        (
            "repo.go",
            r#"package shop

type Conn struct{}

func NewConn(url string) (*Conn, error) {
	return &Conn{}, nil
}

type Repo struct {
	C *Conn
}
"#,
        ),
        ("di.go", directives("\tdi.Build(Repo{})\n").as_str()),
    ]);

    run(dir.path());
    assert!(generated(dir.path()).contains(
        "func NewRepo(connUrl string) (repo *Repo, err error) {\n\
         \tconn, err := NewConn(connUrl)\n\
         \tif err != nil {\n\
         \t\treturn\n\
         \t}\n\
         \trepo = &Repo{\n\
         \t\tC: conn,\n\
         \t}\n\
         \treturn\n\
         }\n"
    ));
}

#[test]
fn test_failures_write_nothing() {
    let dir = module(&[
        (
            "graph.go",
            r#"package shop

type A struct {
	B *B
}

type B struct {
	A *A
}

type Notifier interface {
	Notify() error
}

type Service struct {
	N Notifier
}
"#,
        ),
        ("di.go", directives("\tdi.Build(A{})\n\tdi.Build(Service{})\n").as_str()),
    ]);

    let config = GeneratorConfig::builder().root(dir.path()).without_env().build();
    let err = wirego::run(&config).expect_err("generation must fail");
    let CodegenError::Diagnostics { errors } = err else {
        panic!("expected diagnostics");
    };
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0].root(), CodegenError::CycleDetected { .. }));
    assert!(matches!(errors[1].root(), CodegenError::MissingBinding { .. }));
    assert!(errors[0].to_string().contains("di.go:"));
    assert!(!dir.path().join("di_generated.go").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = module(&[
        ("db.go", "package shop\n\ntype Db struct {\n\tdsn string\n}\n"),
        ("di.go", directives("\tdi.Build(Db{})\n").as_str()),
    ]);

    let config = GeneratorConfig::builder()
        .root(dir.path())
        .without_env()
        .dry_run(true)
        .build();
    let report = wirego::run(&config).expect("Failed to run generation");
    assert_eq!(report.written(), 1);
    assert!(!dir.path().join("di_generated.go").exists());
}

#[test]
fn test_missing_method_is_reported() {
    let dir = module(&[
        (
            "writer.go",
            r#"package shop

type Writer interface {
	Write(p []byte) (int, error)
}

type NullWriter struct{}

func (n NullWriter) Close() error { return nil }
"#,
        ),
        ("di.go", directives("\tdi.Bind(Writer, NullWriter{})\n").as_str()),
    ]);

    let config = GeneratorConfig::builder().root(dir.path()).without_env().build();
    let err = wirego::run(&config).expect_err("generation must fail");
    let CodegenError::Diagnostics { errors } = err else {
        panic!("expected diagnostics");
    };
    assert_eq!(errors.len(), 1);
    match errors[0].root() {
        CodegenError::MissingMethod {
            implementation,
            method,
            ..
        } => {
            assert_eq!(implementation, "shop.NullWriter");
            assert_eq!(method, "Write");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("di_generated.go").exists());
}

#[test]
fn test_keyed_binding_cannot_fill_field() {
    let dir = module(&[
        (
            "notify.go",
            r#"package shop

type Notifier interface {
	Notify(msg string) error
}

type SmsNotifier struct{}

func (s SmsNotifier) Notify(msg string) error { return nil }

type Service struct {
	N Notifier
}
"#,
        ),
        (
            "di.go",
            directives(
                "\tdi.Bind(Notifier, map[string]any{\n\t\t\"sms\": SmsNotifier{},\n\t})\n\tdi.Build(Service{})\n",
            )
            .as_str(),
        ),
    ]);

    let config = GeneratorConfig::builder().root(dir.path()).without_env().build();
    let err = wirego::run(&config).expect_err("generation must fail");
    let CodegenError::Diagnostics { errors } = err else {
        panic!("expected diagnostics");
    };
    assert_eq!(errors.len(), 1);
    match errors[0].root() {
        CodegenError::KeyedBindingField { record, field, .. } => {
            assert_eq!(record, "Service");
            assert_eq!(field, "N");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_undecodable_source_does_not_abort_run() {
    let dir = module(&[
        ("db.go", "package shop\n\ntype Db struct {\n\tdsn string\n}\n"),
        ("di.go", directives("\tdi.Build(Db{})\n").as_str()),
    ]);
    let mut latin1 = b"package shop\n\n// caf".to_vec();
    latin1.push(0xE9);
    latin1.extend_from_slice(b"\n");
    fs::write(dir.path().join("latin1.go"), latin1).expect("Failed to write source");

    let report = run(dir.path());
    assert_eq!(report.written(), 1);
    assert!(generated(dir.path()).contains("func NewDb(dsn string) (db *Db) {\n"));
}

#[test]
fn test_legacy_unit_is_removed_when_current_is_up_to_date() {
    let dir = module(&[
        ("db.go", "package shop\n\ntype Db struct {\n\tdsn string\n}\n"),
        ("di.go", directives("\tdi.Build(Db{})\n").as_str()),
    ]);
    run(dir.path());

    let legacy = dir.path().join("di_gen.go");
    fs::write(&legacy, "package shop\n\nfunc NewDb() *Db { return nil }\n")
        .expect("Failed to write legacy unit");
    let report = run(dir.path());
    assert_eq!(report.count(WriteOutcome::Unchanged), 1);
    assert!(!legacy.exists());
}
