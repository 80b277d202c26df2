// ABOUTME: Fuzzy search over the addresses indexed in a known_hosts collection
// ABOUTME: Ranks exact, prefix, substring and in-order subsequence matches with optional case folding

pub struct SearchEngine<'a> {
    addresses: Vec<&'a str>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(addresses: Vec<&'a str>) -> Self {
        Self { addresses }
    }

    pub fn search(&self, query: &str, case_sensitive: bool, max_results: usize) -> Vec<&'a str> {
        if query.is_empty() {
            return self.addresses.iter().copied().take(max_results).collect();
        }

        let query = normalize(query, case_sensitive);

        let mut results: Vec<(&'a str, usize)> = self
            .addresses
            .iter()
            .filter_map(|address| {
                let score = calculate_fuzzy_score(&normalize(address, case_sensitive), &query);
                (score > 0).then_some((*address, score))
            })
            .collect();

        // Stable sort keeps address order for equal scores
        results.sort_by(|a, b| b.1.cmp(&a.1));

        results
            .into_iter()
            .take(max_results)
            .map(|(address, _)| address)
            .collect()
    }
}

fn normalize(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

/// Scores an already-normalized target against an already-normalized query. Zero means no match.
fn calculate_fuzzy_score(target: &str, query: &str) -> usize {
    if target == query {
        return 1000;
    }

    if let Some(rest) = target.strip_prefix(query) {
        // Shorter addresses rank higher
        let mut score = 900 + (50 - target.len().min(50));
        if rest.chars().next().is_some_and(|c| !c.is_alphanumeric()) {
            score += 50;
        }
        return score;
    }

    if let Some(position) = target.find(query) {
        return 700 - position.min(100);
    }

    // Every query character must appear in order
    let mut score = 0;
    let mut query_chars = query.chars().peekable();
    let mut consecutive = 0;
    let mut first_match = None;

    for (i, target_char) in target.chars().enumerate() {
        match query_chars.peek() {
            Some(&qc) if qc == target_char => {
                first_match.get_or_insert(i);
                score += 100 + consecutive * 10;
                consecutive += 1;
                query_chars.next();
            }
            Some(_) => consecutive = 0,
            None => break,
        }
    }

    if query_chars.peek().is_some() {
        return 0;
    }
    if first_match == Some(0) {
        score += 50;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_empty_query_returns_all() {
        let engine = SearchEngine::new(vec!["server1", "server2", "server3"]);
        assert_eq!(engine.search("", false, 10).len(), 3);
    }

    #[test]
    fn test_exact_match() {
        let engine = SearchEngine::new(vec!["production", "prod-backup", "staging"]);
        let results = engine.search("production", false, 10);

        assert_eq!(results, vec!["production"]);
    }

    #[test]
    fn test_prefix_match() {
        let engine = SearchEngine::new(vec!["production", "prod-backup", "staging"]);
        let results = engine.search("prod", false, 10);

        assert_eq!(results.len(), 2);
        // Word boundary after the prefix wins
        assert_eq!(results[0], "prod-backup");
    }

    #[test]
    fn test_fuzzy_match() {
        let engine = SearchEngine::new(vec!["development-server", "test-server", "10.0.0.5"]);
        let results = engine.search("dsr", false, 10);

        assert_eq!(results, vec!["development-server"]);
    }

    #[test]
    fn test_ip_and_bracketed_port_addresses() {
        let engine = SearchEngine::new(vec!["192.168.1.1", "[git.example.com]:2222", "10.1.1.1"]);

        assert_eq!(engine.search("192.168", false, 10), vec!["192.168.1.1"]);
        assert_eq!(engine.search("git", false, 10), vec!["[git.example.com]:2222"]);
    }

    #[test]
    fn test_case_sensitivity() {
        let engine = SearchEngine::new(vec!["Server1", "server2"]);

        assert_eq!(engine.search("server", false, 10).len(), 2);
        assert_eq!(engine.search("server", true, 10), vec!["server2"]);
    }

    #[test]
    fn test_max_results_limit() {
        let addresses: Vec<String> = (0..100).map(|i| format!("server{i}.example.com")).collect();
        let engine = SearchEngine::new(addresses.iter().map(String::as_str).collect());

        assert_eq!(engine.search("server", false, 5).len(), 5);
    }

    #[test]
    fn test_performance_under_50ms() {
        let addresses: Vec<String> = (0..1000).map(|i| format!("server{i}.example.com")).collect();
        let engine = SearchEngine::new(addresses.iter().map(String::as_str).collect());

        let start = Instant::now();
        let _results = engine.search("server42", false, 20);
        let duration = start.elapsed();

        assert!(
            duration.as_millis() < 50,
            "Search took {duration:?}, should be under 50ms"
        );
    }

    #[test]
    fn test_fuzzy_scoring_order() {
        let engine = SearchEngine::new(vec![
            "github.com",
            "gitlab.company.com",
            "git.internal",
            "bitbucket.org",
        ]);
        let results = engine.search("git", false, 10);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], "git.internal");
        assert!(results.contains(&"github.com"));
        assert!(results.contains(&"gitlab.company.com"));
    }
}
