//! Skip correlation decisions across file-download and link-crawl challenges.

use std::sync::Arc;

use captcha_skip::correlate::can_be_skipped_by;
use captcha_skip::error::Error;
use captcha_skip::model::*;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn text(plugin: Option<Plugin>, role: CreatorRole) -> Challenge<String> {
    Challenge::new(TextCaptcha::default(), "image", "type the text", role, plugin)
}

fn link_in(package: &Arc<FilePackage>, host: &str) -> Arc<DownloadLink> {
    Arc::new(
        DownloadLink::new(format!("https://{host}/file"), Arc::clone(package))
            .with_default_plugin(host),
    )
}

fn download(host: &str) -> Challenge<String> {
    download_in(host, &FilePackage::new("misc"))
}

fn download_in(host: &str, package: &Arc<FilePackage>) -> Challenge<String> {
    let plugin = HostPlugin::new(host).with_link(link_in(package, host));
    text(Some(plugin.into()), CreatorRole::DownloadWorker)
}

fn crawl(host: &str, session: CrawlSessionId, link: &Arc<CrawledLink>) -> Challenge<String> {
    let plugin = CrawlPlugin::new(host, session).with_link(Arc::clone(link));
    text(Some(plugin.into()), CreatorRole::CrawlWorker)
}

fn skip(current: &Challenge<String>, target: &Challenge<String>, scope: SkipScope) -> bool {
    can_be_skipped_by(current, target, scope, None).expect("current has provenance")
}

// ---------------------------------------------------------------------------
// Literal scenarios
// ---------------------------------------------------------------------------

#[test]
fn same_hoster_is_blocked() {
    let current = download("alpha.example");
    let target = download("alpha.example");
    assert!(skip(&current, &target, SkipScope::BlockHoster));
}

#[test]
fn other_hoster_is_not_blocked() {
    let current = download("alpha.example");
    let target = download("beta.example");
    assert!(!skip(&current, &target, SkipScope::BlockHoster));
}

#[test]
fn account_login_blocks_nothing() {
    let mut current = download("alpha.example");
    current.set_account_login(true);
    let target = download("alpha.example");
    for scope in SkipScope::ALL {
        assert!(!skip(&current, &target, scope), "{scope}");
    }
}

#[test]
fn crawl_sessions_never_cross() {
    let l1 = CrawledLink::root("https://folder.example/1");
    let current = crawl("folder.example", CrawlSessionId::new(), &l1);
    let target = crawl("folder.example", CrawlSessionId::new(), &l1);
    assert!(!skip(&current, &target, SkipScope::StopCurrentAction));
}

#[test]
fn crawl_package_follows_origin_link() {
    let session = CrawlSessionId::new();
    let l1 = CrawledLink::root("https://folder.example/1");
    let l2 = CrawledLink::root("https://folder.example/2");
    let current = crawl("folder.example", session, &l1);

    let child = CrawledLink::child(&l1, "https://files.example/a");
    let same_origin = crawl("files.example", session, &child);
    assert!(skip(&current, &same_origin, SkipScope::BlockPackage));

    let other_origin = crawl("folder.example", session, &l2);
    assert!(!skip(&current, &other_origin, SkipScope::BlockPackage));
}

#[test]
fn download_never_blocks_crawl() {
    let current = download("alpha.example");
    let link = CrawledLink::root("https://alpha.example/folder");
    let target = crawl("alpha.example", CrawlSessionId::new(), &link);
    assert!(!skip(&current, &target, SkipScope::BlockAllCaptchas));
}

// ---------------------------------------------------------------------------
// File-download branch
// ---------------------------------------------------------------------------

#[test]
fn account_checker_blocks_nothing() {
    let pkg = FilePackage::new("p");
    let plugin = HostPlugin::new("alpha.example").with_link(link_in(&pkg, "alpha.example"));
    let current = text(Some(plugin.into()), CreatorRole::AccountChecker);
    let target = download_in("alpha.example", &pkg);
    for scope in SkipScope::ALL {
        assert!(!skip(&current, &target, scope), "{scope}");
    }
}

#[test]
fn login_target_is_still_blocked_by_plain_current() {
    // The guard only looks at the challenge the intent was raised against.
    let current = download("alpha.example");
    let target = download("alpha.example").with_account_login(true);
    assert!(skip(&current, &target, SkipScope::BlockAllCaptchas));
}

#[test]
fn block_all_captchas_matches_any_download() {
    let current = download("alpha.example");
    let target = download("gamma.example");
    assert!(skip(&current, &target, SkipScope::BlockAllCaptchas));
}

#[test]
fn stop_current_action_is_inert_for_downloads() {
    let pkg = FilePackage::new("p");
    let current = download_in("alpha.example", &pkg);
    let target = download_in("alpha.example", &pkg);
    assert!(!skip(&current, &target, SkipScope::StopCurrentAction));
}

#[test]
fn hoster_match_is_case_sensitive() {
    let current = download("alpha.example");
    let target = download("Alpha.example");
    assert!(!skip(&current, &target, SkipScope::BlockHoster));
}

#[test]
fn target_without_link_is_kept() {
    let current = download("alpha.example");
    let target = text(
        Some(HostPlugin::new("alpha.example").into()),
        CreatorRole::DownloadWorker,
    );
    assert!(!skip(&current, &target, SkipScope::BlockAllCaptchas));
}

#[test]
fn target_without_plugin_is_kept() {
    let current = download("alpha.example");
    let target = text(None, CreatorRole::Other);
    assert!(!skip(&current, &target, SkipScope::BlockAllCaptchas));
}

#[test]
fn same_user_package_is_blocked() {
    let pkg = FilePackage::new("holiday photos");
    let current = download_in("alpha.example", &pkg);
    let target = download_in("beta.example", &pkg);
    assert!(skip(&current, &target, SkipScope::BlockPackage));
}

#[test]
fn equal_package_names_are_different_packages() {
    let current = download_in("alpha.example", &FilePackage::new("photos"));
    let target = download_in("alpha.example", &FilePackage::new("photos"));
    assert!(!skip(&current, &target, SkipScope::BlockPackage));
}

#[test]
fn default_package_never_blocks() {
    let ungrouped = FilePackage::default_package();
    let current = download_in("alpha.example", &ungrouped);
    let target = download_in("alpha.example", &ungrouped);
    assert!(!skip(&current, &target, SkipScope::BlockPackage));
}

#[test]
fn package_needs_default_plugin_on_target() {
    let pkg = FilePackage::new("p");
    let current = download_in("alpha.example", &pkg);
    let unbound = Arc::new(DownloadLink::new("https://alpha.example/x", Arc::clone(&pkg)));
    let target = text(
        Some(HostPlugin::new("alpha.example").with_link(unbound).into()),
        CreatorRole::DownloadWorker,
    );
    assert!(!skip(&current, &target, SkipScope::BlockPackage));
    assert!(skip(&current, &target, SkipScope::BlockHoster));
}

#[test]
fn package_needs_link_on_current() {
    let pkg = FilePackage::new("p");
    let current = text(
        Some(HostPlugin::new("alpha.example").into()),
        CreatorRole::DownloadWorker,
    );
    let target = download_in("alpha.example", &pkg);
    assert!(!skip(&current, &target, SkipScope::BlockPackage));
    assert!(skip(&current, &target, SkipScope::BlockHoster));
}

// ---------------------------------------------------------------------------
// Link-crawl branch
// ---------------------------------------------------------------------------

#[test]
fn crawl_stop_and_block_all_within_session() {
    let session = CrawlSessionId::new();
    let current = crawl("folder.example", session, &CrawledLink::root("https://a/1"));
    let target = crawl("other.example", session, &CrawledLink::root("https://b/2"));
    assert!(skip(&current, &target, SkipScope::StopCurrentAction));
    assert!(skip(&current, &target, SkipScope::BlockAllCaptchas));
    assert!(!skip(&current, &target, SkipScope::BlockHoster));
    assert!(!skip(&current, &target, SkipScope::BlockPackage));
}

#[test]
fn crawl_hoster_within_session() {
    let session = CrawlSessionId::new();
    let current = crawl("folder.example", session, &CrawledLink::root("https://a/1"));
    let target = crawl("folder.example", session, &CrawledLink::root("https://a/2"));
    assert!(skip(&current, &target, SkipScope::BlockHoster));
}

#[test]
fn different_sessions_never_match_any_scope() {
    let l1 = CrawledLink::root("https://folder.example/1");
    let current = crawl("folder.example", CrawlSessionId::new(), &l1);
    let target = crawl("folder.example", CrawlSessionId::new(), &l1);
    for scope in SkipScope::ALL {
        assert!(!skip(&current, &target, scope), "{scope}");
    }
}

#[test]
fn crawl_never_blocks_download() {
    let l1 = CrawledLink::root("https://alpha.example/folder");
    let current = crawl("alpha.example", CrawlSessionId::new(), &l1);
    let target = download("alpha.example");
    for scope in SkipScope::ALL {
        assert!(!skip(&current, &target, scope), "{scope}");
    }
}

#[test]
fn crawl_target_without_link_has_no_package() {
    let session = CrawlSessionId::new();
    let current = crawl("folder.example", session, &CrawledLink::root("https://a/1"));
    let target = text(
        Some(CrawlPlugin::new("folder.example", session).into()),
        CreatorRole::CrawlWorker,
    );
    assert!(!skip(&current, &target, SkipScope::BlockPackage));
    assert!(skip(&current, &target, SkipScope::BlockHoster));
}

#[test]
fn crawl_login_flag_does_not_guard() {
    let session = CrawlSessionId::new();
    let link = CrawledLink::root("https://a/1");
    let current = crawl("folder.example", session, &link).with_account_login(true);
    let target = crawl("folder.example", session, &link);
    assert!(skip(&current, &target, SkipScope::StopCurrentAction));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn current_without_plugin_is_an_invariant_violation() {
    let current = text(None, CreatorRole::Other);
    let target = download("alpha.example");
    let err =
        can_be_skipped_by(&current, &target, SkipScope::BlockAllCaptchas, None).unwrap_err();
    assert!(matches!(err, Error::MissingProvenance(id) if id == current.id()));
    assert!(err.is_fatal());
}

#[test]
fn solver_does_not_change_the_decision() {
    let current = download("alpha.example");
    let target = download("alpha.example");
    let solver = SolverId::new("dialog");
    for scope in SkipScope::ALL {
        assert_eq!(
            can_be_skipped_by(&current, &target, scope, Some(&solver)).unwrap(),
            skip(&current, &target, scope)
        );
    }
}
