use maillog_core::{
    CorrelateConfig, Daemon, MemorySource, QueueId, RecipientAttempt,
    RecordPolicy, correlate, filter_ids,
};

const CLIENT: &str =
    "Oct 12 08:00:01 mx1 postfix/smtpd[4242]: ABC123: client=localhost[127.0.0.1]";
const QUEUED: &str = "Oct 12 08:00:01 mx1 postfix/qmgr[77]: ABC123: from=<s@dom>, size=812, nrcpt=1 (queue active)";
const REMOVED: &str = "Oct 12 08:00:03 mx1 postfix/qmgr[77]: ABC123: removed";

fn delivery(detail: &str) -> String {
    format!("Oct 12 08:00:02 mx1 postfix/smtp[5001]: ABC123: {detail}")
}

fn source(lines: &[String]) -> MemorySource {
    lines.iter().cloned().collect()
}

fn abc() -> QueueId {
    QueueId::from("ABC123")
}

#[test]
fn bounced_recipient_is_reported() {
    let lines = vec![
        CLIENT.to_string(),
        QUEUED.to_string(),
        delivery("to=<r@dom>, relay=mx.dom[192.0.2.7]:25, delay=0.4, dsn=5.1.1, status=bounced (user unknown)"),
        REMOVED.to_string(),
    ];
    let result = correlate(&CorrelateConfig::default(), &source(&lines)).unwrap();

    let record = result.records.get(&abc()).expect("record for ABC123");
    assert_eq!(record.sender, "s@dom");
    assert_eq!(record.source_domain, "");
    assert!(record.completed);
    assert_eq!(
        record.attempts,
        vec![RecipientAttempt {
            to: "r@dom".to_string(),
            original_to: None,
            status: "bounced".to_string()
        }]
    );

    let rejected = result.rejected.last_per_queue_id();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[&abc()], "r@dom");
}

#[test]
fn delivered_message_is_not_rejected() {
    let lines = vec![
        CLIENT.to_string(),
        QUEUED.to_string(),
        delivery("to=<r@dom>, relay=mx.dom[192.0.2.7]:25, delay=0.4, dsn=2.0.0, status=sent (250 2.0.0 Ok)"),
        REMOVED.to_string(),
    ];

    let all = correlate(&CorrelateConfig::default(), &source(&lines)).unwrap();
    assert!(all.records.contains(&abc()));
    assert!(all.rejected.is_empty());

    let target_only = CorrelateConfig {
        record_policy: RecordPolicy::TargetOnly,
        ..CorrelateConfig::default()
    };
    let filtered = correlate(&target_only, &source(&lines)).unwrap();
    assert!(filtered.ids.contains(&abc()));
    assert!(!filtered.records.contains(&abc()));
    assert!(filtered.rejected.is_empty());
}

#[test]
fn original_recipient_is_reported_for_rewritten_address() {
    let lines = vec![
        CLIENT.to_string(),
        QUEUED.to_string(),
        delivery("to=<rewritten@dom>, orig_to=<original@dom>, relay=mx.dom[192.0.2.7]:25, delay=0.4, dsn=5.1.1, status=bounced (user unknown)"),
        REMOVED.to_string(),
    ];
    let result = correlate(&CorrelateConfig::default(), &source(&lines)).unwrap();

    assert_eq!(result.rejected.last_per_queue_id()[&abc()], "original@dom");
    assert!(!result.rejected.distinct().contains("rewritten@dom"));
}

#[test]
fn deferred_then_bounced_keeps_both_attempts_in_order() {
    let lines = vec![
        CLIENT.to_string(),
        QUEUED.to_string(),
        delivery("to=<slow@dom>, relay=none, delay=30, dsn=4.4.1, status=deferred (connect to mx.dom timed out)"),
        delivery("to=<gone@dom>, relay=mx.dom[192.0.2.7]:25, delay=31, dsn=5.1.1, status=bounced (user unknown)"),
        REMOVED.to_string(),
    ];
    let result = correlate(&CorrelateConfig::default(), &source(&lines)).unwrap();

    let record = result.records.get(&abc()).unwrap();
    let statuses: Vec<&str> =
        record.attempts.iter().map(|attempt| attempt.status.as_str()).collect();
    assert_eq!(statuses, vec!["deferred", "bounced"]);

    let rejected = result.rejected.last_per_queue_id();
    assert_eq!(rejected[&abc()], "gone@dom");
    assert_eq!(result.rejected.by_queue_id()[&abc()], vec!["gone@dom".to_string()]);
}

#[test]
fn interleaved_queue_ids_are_kept_apart() {
    let text = concat!(
        "Oct 12 08:00:01 mx1 postfix/smtpd[1]: AAA: client=localhost[127.0.0.1]\n",
        "Oct 12 08:00:01 mx1 postfix/smtpd[1]: BBB: client=localhost[127.0.0.1]\n",
        "Oct 12 08:00:01 mx1 postfix/cleanup[2]: BBB: message-id=<b.1@shop.example>\n",
        "Oct 12 08:00:01 mx1 postfix/cleanup[2]: AAA: message-id=<a.1@news.example>\n",
        "Oct 12 08:00:01 mx1 postfix/qmgr[3]: BBB: from=<shop@shop.example>, size=1, nrcpt=2 (queue active)\n",
        "Oct 12 08:00:01 mx1 postfix/qmgr[3]: AAA: from=<news@news.example>, size=1, nrcpt=1 (queue active)\n",
        "Oct 12 08:00:02 mx1 postfix/smtp[4]: BBB: to=<x@far.example>, relay=far.example[192.0.2.1]:25, delay=1, dsn=5.0.0, status=bounced (rejected)\n",
        "Oct 12 08:00:02 mx1 postfix/smtp[5]: AAA: to=<y@far.example>, relay=far.example[192.0.2.1]:25, delay=1, dsn=2.0.0, status=sent (ok)\n",
        "Oct 12 08:00:02 mx1 postfix/smtp[4]: BBB: to=<z@far.example>, relay=far.example[192.0.2.1]:25, delay=1, dsn=5.0.0, status=bounced (rejected)\n",
        "Oct 12 08:00:03 mx1 postfix/qmgr[3]: AAA: removed\n",
    );
    let result = correlate(&CorrelateConfig::default(), &MemorySource::from_text(text)).unwrap();

    let aaa = result.records.get(&QueueId::from("AAA")).unwrap();
    let bbb = result.records.get(&QueueId::from("BBB")).unwrap();

    assert_eq!(aaa.sender, "news@news.example");
    assert_eq!(aaa.source_domain, "news.example");
    assert!(aaa.completed);
    assert_eq!(aaa.attempts.len(), 1);

    assert_eq!(bbb.sender, "shop@shop.example");
    assert_eq!(bbb.source_domain, "shop.example");
    assert!(!bbb.completed);
    assert_eq!(bbb.attempts.len(), 2);

    assert_eq!(
        result.rejected.by_queue_id()[&QueueId::from("BBB")],
        vec!["x@far.example".to_string(), "z@far.example".to_string()]
    );
    assert_eq!(result.rejected.distinct().len(), 2);
}

#[test]
fn server_pattern_keeps_other_hosts_out_of_records() {
    let text = concat!(
        "Oct 12 08:00:01 mx1 postfix/smtpd[1]: ABC123: client=localhost[127.0.0.1]\n",
        "Oct 12 08:00:01 mx2 postfix/smtpd[9]: ABC123: client=localhost[127.0.0.1]\n",
        "Oct 12 08:00:01 mx1 postfix/qmgr[3]: ABC123: from=<app@mx1.example>, size=1, nrcpt=1 (queue active)\n",
        "Oct 12 08:00:01 mx2 postfix/qmgr[8]: ABC123: from=<other@mx2.example>, size=1, nrcpt=1 (queue active)\n",
        "Oct 12 08:00:02 mx1 postfix/smtp[4]: ABC123: to=<ok@far.example>, relay=far.example[192.0.2.1]:25, delay=1, dsn=2.0.0, status=sent (ok)\n",
        "Oct 12 08:00:02 mx2 postfix/smtp[7]: ABC123: to=<victim@far.example>, relay=far.example[192.0.2.1]:25, delay=1, dsn=5.1.1, status=bounced (no such user)\n",
        "Oct 12 08:00:03 mx2 postfix/qmgr[8]: ABC123: removed\n",
    );
    let source = MemorySource::from_text(text);
    let config = CorrelateConfig {
        server: "mx1".to_string(),
        ..CorrelateConfig::default()
    };

    let result = correlate(&config, &source).unwrap();
    let record = result.records.get(&abc()).expect("record for ABC123");

    assert_eq!(result.ids.len(), 1);
    assert_eq!(record.sender, "app@mx1.example");
    assert_eq!(record.raw_lines.len(), 3);
    assert!(!record.completed);
    assert_eq!(
        record.attempts,
        vec![RecipientAttempt {
            to: "ok@far.example".to_string(),
            original_to: None,
            status: "sent".to_string()
        }]
    );
    assert!(result.rejected.is_empty());

    let target_only = CorrelateConfig {
        record_policy: RecordPolicy::TargetOnly,
        ..config
    };
    let filtered = correlate(&target_only, &source).unwrap();
    assert!(filtered.records.is_empty());
    assert!(filtered.rejected.is_empty());

    let any_host = correlate(&CorrelateConfig::default(), &source).unwrap();
    assert_eq!(any_host.rejected.last_per_queue_id()[&abc()], "victim@far.example");
}

#[test]
fn identifier_scan_is_idempotent_and_windowed() {
    let lines: Vec<String> = (0..6)
        .map(|n| {
            format!(
                "Oct 12 08:00:0{n} mx1 postfix/smtpd[1]: ID{}: client=localhost[127.0.0.1]",
                n % 4
            )
        })
        .collect();

    let config = CorrelateConfig::default();
    let first = filter_ids(&config, &lines).unwrap();
    let second = filter_ids(&config, &lines).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);

    // matching positions: ID0 ID1 ID2 ID3 ID0 ID1
    let window = CorrelateConfig {
        offset: 3,
        limit: 2,
        ..CorrelateConfig::default()
    };
    let ids: Vec<String> = filter_ids(&window, &lines)
        .unwrap()
        .iter()
        .map(|id| id.to_string())
        .collect();
    assert_eq!(ids, vec!["ID3", "ID0"]);
}

#[test]
fn unknown_daemon_is_rejected_before_scanning() {
    let err = "postfix/local".parse::<Daemon>().expect_err("not a client stage");
    assert!(err.to_string().contains("must be one of"));
}

#[test]
fn correlation_serializes_to_json_report() {
    let lines = vec![
        CLIENT.to_string(),
        QUEUED.to_string(),
        delivery("to=<r@dom>, relay=none, delay=0.4, dsn=5.1.1, status=bounced (user unknown)"),
        REMOVED.to_string(),
    ];
    let result = correlate(&CorrelateConfig::default(), &source(&lines)).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["ids"], serde_json::json!(["ABC123"]));
    assert_eq!(json["records"]["ABC123"]["sender"], "s@dom");
    assert_eq!(json["rejected"][0]["address"], "r@dom");
    assert_eq!(json["partial"], false);
}
