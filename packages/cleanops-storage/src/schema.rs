pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_accounts.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_accounts.sql")),
				"tables/002_sessions.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_sessions.sql")),
				"tables/003_customers.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_customers.sql")),
				"tables/004_sites.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_sites.sql")),
				"tables/005_areas.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_areas.sql")),
				"tables/006_area_tasks.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_area_tasks.sql")),
				"tables/007_qr_codes.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_qr_codes.sql")),
				"tables/008_live_tracking.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_live_tracking.sql")),
				"tables/009_cleaner_workflows.sql" =>
					out.push_str(include_str!("../../../sql/tables/009_cleaner_workflows.sql")),
				"tables/010_cleaner_logs.sql" =>
					out.push_str(include_str!("../../../sql/tables/010_cleaner_logs.sql")),
				"tables/011_assist_requests.sql" =>
					out.push_str(include_str!("../../../sql/tables/011_assist_requests.sql")),
				"tables/012_assist_events.sql" =>
					out.push_str(include_str!("../../../sql/tables/012_assist_events.sql")),
				"tables/013_ops_visits.sql" =>
					out.push_str(include_str!("../../../sql/tables/013_ops_visits.sql")),
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
	#[test]
	fn every_include_is_expanded() {
		let sql = super::render_schema();

		assert!(!sql.contains("\\ir "), "Unexpanded include left in schema.");
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS ops_visits"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS accounts"));
	}
}
