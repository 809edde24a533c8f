use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Aliases folded onto their canonical skill name.
const SKILL_ALIASES: &[(&str, &str)] = &[
	("k8s", "kubernetes"),
	("golang", "go"),
	("js", "javascript"),
	("ts", "typescript"),
	("postgres", "postgresql"),
	("psql", "postgresql"),
	("node", "node.js"),
	("nodejs", "node.js"),
	("reactjs", "react"),
	("react.js", "react"),
	("vuejs", "vue"),
	("vue.js", "vue"),
	("py", "python"),
	("amazon web services", "aws"),
	("google cloud", "gcp"),
	("google cloud platform", "gcp"),
	("ml", "machine learning"),
	("tf", "terraform"),
	("rustlang", "rust"),
];

/// Technologies recognized when scanning free-form job descriptions.
pub const TECH_LEXICON: &[&str] = &[
	"rust",
	"go",
	"python",
	"java",
	"kotlin",
	"scala",
	"ruby",
	"php",
	"swift",
	"javascript",
	"typescript",
	"react",
	"vue",
	"angular",
	"svelte",
	"node.js",
	"graphql",
	"postgresql",
	"mysql",
	"mongodb",
	"redis",
	"kafka",
	"elasticsearch",
	"kubernetes",
	"docker",
	"terraform",
	"aws",
	"gcp",
	"azure",
	"spark",
	"airflow",
	"pytorch",
	"tensorflow",
	"machine learning",
	"grpc",
	"linux",
];

/// NFKC, lowercase and collapse whitespace runs into single spaces.
pub fn normalize_text(input: &str) -> String {
	let folded: String = input.nfkc().collect::<String>().to_lowercase();

	folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokenize(input: &str) -> Vec<String> {
	let normalized = normalize_text(input);

	normalized
		.unicode_words()
		.map(|word| word.trim_matches(|ch: char| ch == '.' || ch == '\'').to_string())
		.filter(|word| !word.is_empty())
		.collect()
}

pub fn normalize_skill(name: &str) -> String {
	let normalized = normalize_text(name);

	SKILL_ALIASES
		.iter()
		.find(|(alias, _)| *alias == normalized)
		.map(|(_, canonical)| canonical.to_string())
		.unwrap_or(normalized)
}

/// True when every token of `phrase` appears contiguously in `tokens`.
pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
	let needle = tokenize(phrase);

	if needle.is_empty() || needle.len() > tokens.len() {
		return false;
	}

	tokens.windows(needle.len()).any(|window| window == needle.as_slice())
}

/// Lexicon technologies mentioned in the text, aliases folded, first mention first.
pub fn detect_technologies(text: &str) -> Vec<String> {
	let tokens = tokenize(text);
	let mut hits: Vec<(usize, String)> = Vec::new();

	for (alias, canonical) in SKILL_ALIASES {
		if TECH_LEXICON.contains(canonical)
			&& let Some(pos) = phrase_position(&tokens, alias)
		{
			hits.push((pos, canonical.to_string()));
		}
	}
	for tech in TECH_LEXICON {
		if let Some(pos) = phrase_position(&tokens, tech) {
			hits.push((pos, tech.to_string()));
		}
	}

	hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

	let mut out: Vec<String> = Vec::with_capacity(hits.len());

	for (_, tech) in hits {
		if !out.contains(&tech) {
			out.push(tech);
		}
	}

	out
}

/// Truncate on a char boundary.
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
	match input.char_indices().nth(max_chars) {
		Some((idx, _)) => &input[..idx],
		None => input,
	}
}

/// Index of the first token of the earliest occurrence of `phrase`.
pub fn phrase_position(tokens: &[String], phrase: &str) -> Option<usize> {
	let needle = tokenize(phrase);

	if needle.is_empty() || needle.len() > tokens.len() {
		return None;
	}

	tokens.windows(needle.len()).position(|window| window == needle.as_slice())
}
