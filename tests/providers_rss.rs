// tests/providers_rss.rs
use trend_brief_aggregator::ingest::providers::rss::RssProvider;
use trend_brief_aggregator::ingest::types::SourceProvider;

const TECH_XML: &str = include_str!("fixtures/tech_feed.xml");
const MARKETS_XML: &str = include_str!("fixtures/markets_feed.xml");

#[tokio::test]
async fn tech_fixture_parses_in_feed_order() {
    let provider = RssProvider::from_fixture("tech", TECH_XML);
    let items = provider.fetch_latest().await.unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].rank, 1);
    assert_eq!(
        items[0].title,
        "Chipmaker unveils 2nm process ahead of schedule"
    );
    assert_eq!(
        items[0].link.as_deref(),
        Some("https://techwire.test/articles/2nm-process")
    );
    assert_eq!(items[2].rank, 3);
    assert!(items.iter().all(|i| i.source_id == "tech"));
}

#[tokio::test]
async fn entities_in_titles_are_preserved_for_normalization() {
    let provider = RssProvider::from_fixture("markets", MARKETS_XML);
    let items = provider.fetch_latest().await.unwrap();
    // quick-xml decodes &amp; during parsing
    assert_eq!(
        items[1].title,
        "Oil slips as inventories build & demand cools"
    );
}
