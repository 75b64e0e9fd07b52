use marmot_otel::{
    track_event, HostEnvironment, KeyValue, RenderBoundary, TelemetryOptions, VitalRating,
    VitalSample, Viewport, WebVital,
};
use reqwest::{Method, Url};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let collector = std::env::args().nth(1);

    let mut builder = TelemetryOptions::builder()
        .service_name("marmot-otel-demo")
        .service_version("0.1.0")
        .enabled(true);
    if let Some(url) = collector {
        builder = builder.collector_url(url);
    }

    let host = HostEnvironment {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
            .to_owned(),
        viewport: Viewport::new(1280, 800),
        app_name: Some("marmot-demo-shell".to_owned()),
        app_version: Some("0.1.0".to_owned()),
        ..HostEnvironment::default()
    };

    let mut guard = marmot_otel::init(host, Some(builder.build()))?;

    marmot_otel::set_user_id("user-42");
    marmot_otel::set_user_role("demo");
    marmot_otel::set_route("/dashboard");

    track_event("app_started", &[KeyValue::new("build", "demo")]);

    if let Some(gateway) = marmot_otel::active_gateway() {
        let url = Url::parse("https://httpbin.org/get")?;
        match gateway.send(Method::GET, url).await {
            Ok(response) => println!("fetched: HTTP {}", response.status()),
            Err(error) => println!("fetch failed: {error}"),
        }
    }

    marmot_otel::record_web_vital(&VitalSample {
        vital: WebVital::Lcp,
        value: 1830.0,
        id: "v1-demo".to_owned(),
        rating: VitalRating::NeedsImprovement,
    });

    let boundary = RenderBoundary::new();
    let panel = boundary.render("demo/widget", || panic!("widget exploded"));
    println!("boundary rendered fallback: {}", panel.heading);

    guard.shutdown();
    Ok(())
}
