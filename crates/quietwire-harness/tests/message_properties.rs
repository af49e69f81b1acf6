//! Property-based round trips over the full stack.

use proptest::prelude::*;
use quietwire_bridge::CommandArgs;
use quietwire_harness::{network, online_peer, reply_text};

#[test]
fn prop_any_text_round_trips_between_peers() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime");

    // One shared pair of peers; each case is an independent message.
    let (alice, bob) = runtime.block_on(async {
        let provider = network();
        let alice = online_peer(&provider, "alice").await.expect("alice online");
        let bob = online_peer(&provider, "bob").await.expect("bob online");
        (alice, bob)
    });

    proptest!(ProptestConfig::with_cases(64), |(text in any::<String>())| {
        runtime.block_on(async {
            let args = CommandArgs::new().with("otherUser", "bob").with("text", text.clone());
            let sealed = reply_text(alice.execute("encrypt", args).await)
                .ok_or_else(|| TestCaseError::fail("encrypt failed"))?;

            let theirs =
                CommandArgs::new().with("text", sealed.clone()).with("otherUser", "alice");
            let received = reply_text(bob.execute("decryptTheirs", theirs).await)
                .ok_or_else(|| TestCaseError::fail("decryptTheirs failed"))?;
            prop_assert_eq!(&received, &text);

            let mine = CommandArgs::new().with("text", sealed);
            let read_back = reply_text(alice.execute("decryptMine", mine).await)
                .ok_or_else(|| TestCaseError::fail("decryptMine failed"))?;
            prop_assert_eq!(&read_back, &text);
            Ok(())
        })?;
    });
}

#[test]
fn prop_sealing_the_same_text_twice_never_repeats() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime");

    let alice = runtime.block_on(async {
        let provider = network();
        let alice = online_peer(&provider, "alice").await.expect("alice online");
        let _bob = online_peer(&provider, "bob").await.expect("bob online");
        alice
    });

    proptest!(ProptestConfig::with_cases(32), |(text in ".{0,64}")| {
        runtime.block_on(async {
            let args = CommandArgs::new().with("otherUser", "bob").with("text", text.clone());
            let first = reply_text(alice.execute("encrypt", args.clone()).await)
                .ok_or_else(|| TestCaseError::fail("first encrypt failed"))?;
            let second = reply_text(alice.execute("encrypt", args).await)
                .ok_or_else(|| TestCaseError::fail("second encrypt failed"))?;
            prop_assert_ne!(first, second);
            Ok(())
        })?;
    });
}
