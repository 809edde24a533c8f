/// Bootstrap SQL with `\ir` includes inlined, in dependency order.
pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_candidates.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_candidates.sql")),
				"tables/002_search_cache.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_search_cache.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn inlines_every_include() {
		let sql = render_schema();

		assert!(!sql.contains("\\ir "));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS candidates"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS search_cache"));

		let candidates = sql.find("candidates (").expect("candidates table must be present");
		let cache = sql.find("search_cache (").expect("search_cache table must be present");

		assert!(candidates < cache);
	}
}
