use ept::prelude::*;
use ept::resource::file::FileClient;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "file://assets/autzen/ept.json".to_string());

    let index = PointCloudIndex::from_url(&url, ResourceLoader::new(FileClient), BinaryDecoder)
        .await
        .unwrap();

    println!("Points: {}", index.point_count().unwrap());
    println!("Extent: {:?}", index.extent().unwrap());
    println!("Nodes: {}", index.hierarchy().unwrap().len());

    for attribute in index.attributes().unwrap() {
        let mean = index
            .metadata_statistic(&attribute.name, StatisticKind::Mean)
            .unwrap();
        println!("  {} ({}) mean={:?}", attribute.name, attribute.data_type, mean);
    }

    let root = index.fetch_node_data(&NodeId::ROOT, &["X", "Y", "Z"]).await.unwrap();
    for position in root.positions().take(5) {
        println!("  {position}");
    }
}
