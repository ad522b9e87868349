use formula_sql::{
    Dialect, ResolvedColumn,
    ast::Expr,
    parser::parse,
    translate::{self, compile},
};
use tracing_subscriber::EnvFilter;

// Reads one formula per line and prints its SQL. Every identifier is taken
//  as a plain column name.
//
//   echo 'IF(a > 0, "pos", "neg")' | RUST_LOG=debug compile_check mssql
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let dialect: Dialect = match std::env::args().nth(1) {
        Some(name) => name.parse().expect("a dialect: pg, mysql, sqlite or mssql"),
        None => Dialect::Postgres,
    };
    println!("sizeof(Expr) = {}", std::mem::size_of::<Expr>());

    let columns = |name: &str| Some(ResolvedColumn::name(name));
    for line in std::io::stdin().lines() {
        let line = line.expect("a line");
        let now = std::time::Instant::now();
        let res = parse(&line)
            .map_err(translate::Error::from)
            .and_then(|expr| compile(&expr, dialect, &columns, None));
        print!("[in {}μs] ", now.elapsed().as_micros());
        match res {
            Err(e) => println!("Error compiling input: {e}"),
            Ok(fragment) => println!("{fragment}"),
        }
    }
}
