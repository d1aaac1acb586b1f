use mnemo_domain::Predicate;
use sqlx::{Postgres, QueryBuilder};

/// Renders a compiled metadata predicate into a SQL condition.
///
/// Paths are bound as parameters and cast to `jsonpath`, never interpolated,
/// so user-controlled filter input cannot alter the statement shape.
pub fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, column: &str, predicate: &Predicate) {
	match predicate {
		Predicate::True => {
			builder.push("TRUE");
		},
		Predicate::PathExists(path) => {
			builder.push("jsonb_path_exists(");
			builder.push(column);
			builder.push(", ");
			builder.push_bind(path.as_str().to_owned());
			builder.push("::jsonpath)");
		},
		Predicate::All(children) => push_group(builder, column, children, " AND "),
		Predicate::Any(children) => push_group(builder, column, children, " OR "),
	}
}

fn push_group(
	builder: &mut QueryBuilder<'_, Postgres>,
	column: &str,
	children: &[Predicate],
	separator: &str,
) {
	builder.push("(");

	for (i, child) in children.iter().enumerate() {
		if i > 0 {
			builder.push(separator);
		}

		push_predicate(builder, column, child);
	}

	builder.push(")");
}
