use std::time::Duration;

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::utils::unpack::hunter::encode;

const KEY: &str = "kNDgxJBsV";
const OFFSET: u32 = 31;
const BASE: u32 = 4;

fn test_config() -> ResolverConfig {
    ResolverConfig {
        max_attempts: 3,
        retry_delay_ms: 0,
        dns_over_https: false,
        ..Default::default()
    }
}

fn locker_page(action: &str, token: &str) -> String {
    let markup = format!(
        r#"<form action="{action}" method="POST" id="dl"><input type="hidden" name="_token" value="{token}"><button type="submit" class="button">Download</button></form>"#
    );
    let encoded = encode(&markup, KEY, OFFSET, BASE);

    format!(
        "<html><head><title>Kwik</title></head><body>\n<script>eval(function(h,u,n,t,e,r){{r=\"\";for(var i=0,len=h.length;i<len;i++){{var s=\"\";while(h[i]!==n[e]){{s+=h[i];i++}}\nfor(var j=0;j<n.length;j++)s=s.replace(new RegExp(n[j],\"g\"),j);r+=String.fromCharCode(_0xc2e(s,e,10)-t)}}return decodeURIComponent(escape(r))}}(\"{encoded}\",18,\"{KEY}\",{OFFSET},{BASE},41))</script></body></html>"
    )
}

async fn mount_locker(server: &MockServer, page_path: &str, action_path: &str, token: &str) {
    let action = format!("{}{action_path}", server.uri());
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "kwik_session=s3ss10n; path=/; httponly")
                .set_body_string(locker_page(&action, token)),
        )
        .mount(server)
        .await;
}

#[test]
fn should_build_decodable_page() {
    let page = locker_page("https://kwik.cx/d/abc", "tok");
    let payload = hunter::locate(&page).unwrap();
    let markup = hunter::decode(&payload).unwrap();
    let credentials = form::extract(&markup).unwrap();

    assert_eq!(credentials.action_url.as_str(), "https://kwik.cx/d/abc");
    assert_eq!(credentials.token, "tok");
}

#[test_log::test(tokio::test)]
async fn should_resolve_redirect_location() {
    let server = MockServer::start().await;
    mount_locker(&server, "/f/abc", "/d/abc", "tok123").await;
    let locker_url = format!("{}/f/abc", server.uri());

    Mock::given(method("POST"))
        .and(path("/d/abc"))
        .and(header("cookie", "kwik_session=s3ss10n"))
        .and(header("referer", locker_url.as_str()))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("_token=tok123"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "https://files.nextcdn.org/get/abc/ep01.mp4"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resolver = LockerResolver::new(test_config()).unwrap();
    let outcome = resolver.resolve(&locker_url).await;

    assert_eq!(
        outcome,
        ResolutionOutcome::Direct("https://files.nextcdn.org/get/abc/ep01.mp4".into())
    );
}

#[test_log::test(tokio::test)]
async fn should_resolve_relative_location_against_action() {
    let server = MockServer::start().await;
    mount_locker(&server, "/f/rel", "/d/rel", "tok").await;

    Mock::given(method("POST"))
        .and(path("/d/rel"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/files/ep02.mkv"))
        .mount(&server)
        .await;

    let resolver = LockerResolver::new(test_config()).unwrap();
    let outcome = resolver.resolve(&format!("{}/f/rel", server.uri())).await;

    assert_eq!(
        outcome,
        ResolutionOutcome::Direct(format!("{}/files/ep02.mkv", server.uri()))
    );
}

#[test_log::test(tokio::test)]
async fn should_resolve_link_from_exchange_body() {
    let server = MockServer::start().await;
    mount_locker(&server, "/f/body", "/d/body", "tok").await;

    Mock::given(method("POST"))
        .and(path("/d/body"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><a href="https://eu-2.files.nextcdn.org/get/x/ep03.webm?t=1">here</a></html>"#,
        ))
        .mount(&server)
        .await;

    let resolver = LockerResolver::new(test_config()).unwrap();
    let outcome = resolver.resolve(&format!("{}/f/body", server.uri())).await;

    assert_eq!(
        outcome.direct_link(),
        Some("https://eu-2.files.nextcdn.org/get/x/ep03.webm?t=1")
    );
}

#[test_log::test(tokio::test)]
async fn should_fail_without_retry_when_exchange_has_no_link() {
    let server = MockServer::start().await;
    let locker_url = format!("{}/f/empty", server.uri());
    let action = format!("{}/d/empty", server.uri());

    Mock::given(method("GET"))
        .and(path("/f/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string(locker_page(&action, "tok")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/d/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nothing</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = LockerResolver::new(test_config()).unwrap();
    let outcome = resolver.resolve(&locker_url).await;

    assert_eq!(
        outcome,
        ResolutionOutcome::Failed("no direct link in exchange response".into())
    );

    let requests = server.received_requests().await.unwrap();
    let post = requests.iter().find(|req| req.method == "POST").unwrap();
    assert!(post.headers.get("cookie").is_none());
}

#[test_log::test(tokio::test)]
async fn should_stop_after_retry_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/f/changed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(5)
        .mount(&server)
        .await;

    let config = ResolverConfig {
        max_attempts: 5,
        ..test_config()
    };
    let resolver = LockerResolver::new(config).unwrap();
    let outcome = resolver
        .resolve(&format!("{}/f/changed", server.uri()))
        .await;

    match outcome {
        ResolutionOutcome::Failed(reason) => {
            assert!(reason.contains("after 5 attempts"), "{reason}");
            assert!(reason.contains("locating"), "{reason}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn should_refetch_page_after_rejected_exchange() {
    let server = MockServer::start().await;
    let action = format!("{}/d/retry", server.uri());

    Mock::given(method("GET"))
        .and(path("/f/retry"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "kwik_session=s3ss10n; path=/")
                .set_body_string(locker_page(&action, "tok")),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/d/retry"))
        .respond_with(ResponseTemplate::new(419).set_body_string("Page Expired"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/d/retry"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "https://cdn.example/ep04.mp4"),
        )
        .mount(&server)
        .await;

    let resolver = LockerResolver::new(test_config()).unwrap();
    let outcome = resolver.resolve(&format!("{}/f/retry", server.uri())).await;

    assert_eq!(
        outcome,
        ResolutionOutcome::Direct("https://cdn.example/ep04.mp4".into())
    );
}

#[test_log::test(tokio::test)]
async fn should_retry_page_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/f/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let resolver = LockerResolver::new(test_config()).unwrap();
    let outcome = resolver.resolve(&format!("{}/f/down", server.uri())).await;

    match outcome {
        ResolutionOutcome::Failed(reason) => assert!(reason.contains("fetching"), "{reason}"),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn should_not_retry_invalid_url() {
    let resolver = LockerResolver::new(test_config()).unwrap();
    let err = resolver.try_resolve("not a url").await.unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.stage(), Some(Stage::Fetching));
}

#[test_log::test(tokio::test)]
async fn should_keep_batch_entries_independent() {
    let server = MockServer::start().await;
    mount_locker(&server, "/f/ok", "/d/ok", "tok").await;
    Mock::given(method("POST"))
        .and(path("/d/ok"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "https://cdn.example/ok.mp4"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/f/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/f/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let config = ResolverConfig {
        max_attempts: 2,
        resolve_timeout_ms: 500,
        ..test_config()
    };
    let resolver = LockerResolver::new(config).unwrap();
    let urls = ["/f/slow", "/f/ok", "/f/broken"].map(|p| format!("{}{p}", server.uri()));

    let outcomes = resolver.resolve_all(urls).await;

    assert_eq!(outcomes.len(), 3);
    assert!(
        matches!(&outcomes[0], ResolutionOutcome::Failed(reason) if reason.contains("timed out")),
        "{outcomes:?}"
    );
    assert_eq!(
        outcomes[1],
        ResolutionOutcome::Direct("https://cdn.example/ok.mp4".into())
    );
    assert!(
        matches!(&outcomes[2], ResolutionOutcome::Failed(reason) if reason.contains("after 2 attempts")),
        "{outcomes:?}"
    );
}

#[test_log::test(tokio::test)]
async fn should_resolve_one_at_a_time() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(300);

    for name in ["first", "second"] {
        let action = format!("{}/d/{name}", server.uri());
        Mock::given(method("GET"))
            .and(path(format!("/f/{name}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(locker_page(&action, "tok"))
                    .set_delay(delay),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/d/{name}")))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("https://cdn.example/{name}.mp4")),
            )
            .mount(&server)
            .await;
    }

    let config = ResolverConfig {
        max_in_flight: 1,
        ..test_config()
    };
    let resolver = LockerResolver::new(config).unwrap();
    let urls = ["/f/first", "/f/second"].map(|p| format!("{}{p}", server.uri()));

    let started = std::time::Instant::now();
    let outcomes = resolver.resolve_all(urls).await;

    assert!(started.elapsed() >= delay * 2, "{:?}", started.elapsed());
    assert_eq!(
        outcomes,
        vec![
            ResolutionOutcome::Direct("https://cdn.example/first.mp4".into()),
            ResolutionOutcome::Direct("https://cdn.example/second.mp4".into()),
        ]
    );
}

#[test]
fn should_classify_errors() {
    let miss = ResolveError::StructuralMiss {
        stage: Stage::Extracting,
    };
    assert!(miss.is_retryable());
    assert_eq!(miss.stage(), Some(Stage::Extracting));

    let decode = ResolveError::from(DecodeError::UnsupportedBase(99));
    assert!(decode.is_retryable());
    assert_eq!(decode.stage(), Some(Stage::Decoding));

    let exhausted = ResolveError::ExhaustedRetries {
        attempts: 5,
        last: Box::new(decode),
    };
    assert!(!exhausted.is_retryable());
    assert_eq!(exhausted.stage(), Some(Stage::Decoding));
    assert_eq!(
        exhausted.to_string(),
        "gave up after 5 attempts: payload decoding failed: unsupported base 99"
    );
}
