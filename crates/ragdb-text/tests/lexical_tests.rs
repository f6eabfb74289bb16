use ragdb_text::{tokenize, LexicalScorer};

fn trained(texts: &[&str]) -> LexicalScorer {
    let mut scorer = LexicalScorer::new().expect("scorer");
    for t in texts { scorer.add(t).expect("add"); }
    scorer.train().expect("train");
    scorer
}

#[test]
fn tokenize_keeps_non_latin_scripts() {
    assert_eq!(tokenize("Привет, мир"), vec!["привет", "мир"]);
    assert_eq!(tokenize("தமிழ் மொழி"), vec!["தமிழ்", "மொழி"]);
    assert_eq!(tokenize("東京タワー、東京駅"), vec!["東京タワー", "東京駅"]);
}

#[test]
fn rank_orders_by_relevance() {
    let scorer = trained(&[
        "banana smoothie guide",
        "apple pie recipe with apple slices",
        "apple cider vinegar",
    ]);
    let hits = scorer.rank("apple").expect("rank");
    let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["apple pie recipe with apple slices", "apple cider vinegar"]);
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn equal_scores_keep_insertion_order() {
    let scorer = trained(&["kiwi one", "kiwi two", "kiwi six"]);
    let hits = scorer.rank("kiwi").expect("rank");
    let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["kiwi one", "kiwi two", "kiwi six"]);
    assert_eq!(hits[0].score, hits[2].score);
}

#[test]
fn rank_reflects_stale_model_until_trained() {
    let mut scorer = trained(&["first mango note"]);
    scorer.add("second mango note").unwrap();
    assert!(scorer.is_stale());
    assert_eq!(scorer.rank("mango").unwrap().len(), 1, "untrained example is not ranked yet");

    scorer.train().unwrap();
    assert!(!scorer.is_stale());
    assert_eq!(scorer.trained_len(), 2);
    assert_eq!(scorer.rank("mango").unwrap().len(), 2);
}

#[test]
fn empty_or_punctuation_query_yields_empty_ranking() {
    let scorer = trained(&["papaya salad"]);
    assert!(scorer.rank("").unwrap().is_empty());
    assert!(scorer.rank("?! ... ,").unwrap().is_empty());
    assert!(scorer.rank("durian").unwrap().is_empty());
}

#[test]
fn rank_before_any_training_is_empty() {
    let mut scorer = LexicalScorer::new().unwrap();
    scorer.add("guava jam").unwrap();
    assert!(scorer.rank("guava").unwrap().is_empty());
    assert_eq!(scorer.num_docs(), 0);
}
