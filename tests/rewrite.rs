// tests/rewrite.rs

//! Integration tests for smali deconfliction.
//!
//! These tests verify that:
//! 1. Reserved namespaces are renamed everywhere and nowhere else
//! 2. Rewriting is idempotent, with and without debug stripping
//! 3. Whole trees are rewritten in place

mod common;

use apkpatch::{Settings, SmaliRewriter};
use common::write_tree;
use std::fs;

const KOTLIN_CLASS: &str = r#".class public final Lmods/Greeter;
.super Ljava/lang/Object;
.source "Greeter.kt"

# annotations
.annotation runtime Lkotlin/Metadata;
    d1 = {
        "\u0000\u0010\n"
    }
    k = 0x1
.end annotation

.annotation system Ldalvik/annotation/SourceDebugExtension;
    value = "SMAP\nGreeter.kt\n"
.end annotation


# direct methods
.method public static greet(Ljava/lang/String;)V
    .registers 3
    .annotation runtime Lkotlin/jvm/JvmStatic;
    .end annotation

    .param p0, "name"    # Ljava/lang/String;

    .line 7
    const-string v0, "name"

    invoke-static {p0, v0}, Lkotlin/jvm/internal/Intrinsics;->checkNotNullParameter(Ljava/lang/Object;Ljava/lang/String;)V

    .local v1, "x":Lkotlinx/coroutines/Job;
    nop

    sget-object v1, Lio/grpc/Status;->OK:Lio/grpc/Status;

    const-string v1, "kotlin.internal.jdk8.JDK8PlatformImplementations"

    .end local v1
    return-void
.end method
"#;

fn rewriter() -> SmaliRewriter {
    SmaliRewriter::from_settings(&Settings::default())
}

#[test]
fn test_reserved_namespaces_renamed() {
    let out = rewriter().rewrite_text(KOTLIN_CLASS, false);

    assert!(out.contains("Lkotlin2/jvm/internal/Intrinsics;"));
    assert!(out.contains("Lio/grpc2/Status;"));
    assert!(out.contains("\"kotlin2.internal.jdk8.JDK8PlatformImplementations\""));
    assert!(!out.contains("Lkotlin/"));
    assert!(!out.contains("Lio/grpc/"));
    assert!(out.contains("Ljava/lang/Object;"));
}

#[test]
fn test_signatures_with_primitive_parameters_renamed() {
    let text = r#".method public static launch(ILkotlin/jvm/functions/Function0;)V
    .registers 2
    invoke-static {p0, p1}, Lmods/Greeter;->wait(ZLkotlinx/coroutines/Job;)V
    invoke-static {p0}, Lmods/Greeter;->call(JLio/grpc/Status;)Lcom/squareup/picasso/Picasso;
    return-void
.end method
"#;
    let out = rewriter().rewrite_text(text, false);

    assert!(out.contains("(ILkotlin2/jvm/functions/Function0;)V"));
    assert!(out.contains("(ZLkotlinx2/coroutines/Job;)V"));
    assert!(out.contains("(JLio/grpc2/Status;)Lcom/squareup/picasso2/Picasso;"));
    for reserved in ["Lkotlin/", "Lkotlinx/", "Lio/grpc/", "Lcom/squareup/picasso/"] {
        assert!(!out.contains(reserved), "{} survived", reserved);
    }
}

#[test]
fn test_runtime_annotations_removed() {
    let out = rewriter().rewrite_text(KOTLIN_CLASS, false);

    assert!(!out.contains("Metadata;"));
    assert!(!out.contains("SourceDebugExtension;"));
    assert!(!out.contains("JvmStatic;"));
    assert!(out.contains(".line 7"));
    assert_eq!(out.matches(".end annotation").count(), 0);
}

#[test]
fn test_debug_directives_stripped() {
    let out = rewriter().rewrite_text(KOTLIN_CLASS, true);

    assert!(!out.contains(".line "));
    assert!(!out.contains(".local "));
    assert!(!out.contains(".end local"));
    assert!(!out.contains(".param "));
    assert!(!out.lines().any(|l| l.trim() == "nop"));
    assert!(!out.contains("\n\n\n"));
    assert!(out.contains("return-void"));
    assert!(out.ends_with(".end method\n"));
}

#[test]
fn test_rewrite_is_idempotent() {
    let rewriter = rewriter();
    for strip in [false, true] {
        let once = rewriter.rewrite_text(KOTLIN_CLASS, strip);
        let twice = rewriter.rewrite_text(&once, strip);
        assert_eq!(once, twice, "strip_debug = {}", strip);
    }
}

#[test]
fn test_rewrite_tree_in_place() {
    let temp = tempfile::tempdir().unwrap();
    write_tree(temp.path(), &[
        ("mods/Greeter.smali", KOTLIN_CLASS),
        ("mods/res/readme.txt", "Lkotlin/ is mentioned here"),
    ]);

    let visited = rewriter().rewrite_tree(temp.path(), true).unwrap();
    assert_eq!(visited, 1);

    let smali = fs::read_to_string(temp.path().join("mods/Greeter.smali")).unwrap();
    assert!(smali.contains("Lkotlin2/"));
    assert_eq!(
        fs::read_to_string(temp.path().join("mods/res/readme.txt")).unwrap(),
        "Lkotlin/ is mentioned here"
    );
}
