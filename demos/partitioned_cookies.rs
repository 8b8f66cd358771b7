//! Stores cookies for an embedded widget under two different top-level sites and shows
//! how partition key collections scope what each site gets to see.
//!
//! Run with `RUST_LOG=debug` to see the jar's log output.
use gosub_cookies::cookies::{
    compute_partition_key, CookieStore, InMemoryCookieStore, PartitionKeyCollection, PartitionPolicy,
};
use gosub_cookies::ZoneId;
use http::{HeaderMap, HeaderValue};
use url::Url;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let store = InMemoryCookieStore::new();
    let zone = ZoneId::new();
    let jar = store.jar_for(zone).ok_or_else(|| anyhow::anyhow!("no jar for zone {}", zone))?;

    let widget = Url::parse("https://widget.example/embed")?;

    for top_level in ["https://news.example", "https://shop.example"] {
        let top_level = Url::parse(top_level)?;
        let key = compute_partition_key(&top_level, PartitionPolicy::TopLevelSite);

        let mut headers = HeaderMap::new();
        headers.append(
            "set-cookie",
            HeaderValue::from_str(&format!("seen_on={}; Secure; Partitioned; Path=/", top_level.host_str().unwrap_or_default()))?,
        );
        headers.append("set-cookie", HeaderValue::from_static("tracking=1; Secure; Path=/"));
        jar.write().store_response_cookies(&widget, &headers, key.as_ref());
    }

    let news = compute_partition_key(&Url::parse("https://news.example")?, PartitionPolicy::TopLevelSite);
    let scopes = [
        ("no partitions", PartitionKeyCollection::new()),
        ("news.example", PartitionKeyCollection::from_optional(news)),
        ("all partitions", PartitionKeyCollection::contains_all()),
    ];

    for (label, scope) in &scopes {
        let header = jar.read().get_request_cookies(&widget, scope);
        println!("{:<16} {:<40} -> {}", label, scope.to_string(), header.unwrap_or_default());
    }

    let removed = jar.write().delete_partitioned(&PartitionKeyCollection::contains_all());
    println!("deleted {} partitioned cookies", removed);

    Ok(())
}
