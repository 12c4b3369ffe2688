//! Upgradeable deployments: implementation, proxy admin and transparent proxy.
//!
//! Run with: cargo test --test upgradeable

mod common;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, U256, address},
};
use anyhow::Result;
use common::{DEPLOYER, Workspace, init_test_tracing, test_config};
use rollout_deploy::{
    DeployError, DeployTask, DeploymentRecord, ErrorKind, ProxyComposer, UpgradeableOptions,
};
use serde_json::Value;

const EXISTING_ADMIN: Address = address!("0000000000000000000000000000000000c0ffee");

fn initializer_args() -> Vec<DynSolValue> {
    let token = DynSolValue::Address(address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"));
    vec![
        token.clone(),
        DynSolValue::Uint(U256::from(10u64).pow(U256::from(18)), 256),
        DynSolValue::Array(vec![token.clone()]),
        DynSolValue::Array(vec![token]),
        DynSolValue::Array(vec![DynSolValue::Address(Address::repeat_byte(0x42))]),
    ]
}

/// Proxy constructor arguments as recorded: `[logic, admin, data]`.
fn proxy_args(record: &DeploymentRecord) -> (String, String, String) {
    let arg = |i: usize| match &record.constructor_arguments[i] {
        Value::String(s) => s.clone(),
        other => panic!("unexpected argument {other}"),
    };
    (arg(0), arg(1), arg(2))
}

#[tokio::test]
async fn test_fresh_proxy_admin_and_initialized_proxy() -> Result<()> {
    init_test_tracing();
    let workspace = Workspace::new()?;
    let mut orchestrator = workspace.orchestrator("bsc-fork", "price-getter", test_config())?;

    let result = orchestrator
        .deploy_upgradeable("PriceGetter", initializer_args(), UpgradeableOptions::default())
        .await?;

    assert!(result.initialized);
    assert!(!result.init_data.is_empty());
    assert_eq!(result.implementation, DEPLOYER.create(0));
    assert_eq!(result.proxy_admin, DEPLOYER.create(1));
    assert_eq!(result.proxy, DEPLOYER.create(2));
    assert_eq!(result.proxy_admin_owner, Some(DEPLOYER));
    assert_eq!(result.contract.address, result.proxy);
    assert_eq!(result.contract.name, "PriceGetter");
    assert!(result.contract.abi.function("initialize").is_some());

    let ledger = orchestrator.ledger();
    let names: Vec<_> = ledger.records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        ["PriceGetter_Implementation", "PriceGetter_ProxyAdmin", "PriceGetter"]
    );

    let admin = ledger.find("PriceGetter_ProxyAdmin").unwrap();
    assert_eq!(admin.constructor_arguments, [Value::String(DEPLOYER.to_checksum(None))]);

    let proxy = ledger.find("PriceGetter").unwrap();
    assert!(proxy.upgradeable_proxy);
    assert_eq!(proxy.contract, "TransparentUpgradeableProxy");
    let (logic, proxy_admin, data) = proxy_args(proxy);
    assert_eq!(logic, result.implementation.to_checksum(None));
    assert_eq!(proxy_admin, result.proxy_admin.to_checksum(None));
    assert_eq!(data, format!("0x{}", hex::encode(&result.init_data)));
    Ok(())
}

#[tokio::test]
async fn test_skip_initialization_leaves_call_data_empty() -> Result<()> {
    let workspace = Workspace::new()?;
    let mut orchestrator = workspace.orchestrator("polygon", "price-getter", test_config())?;

    let options = UpgradeableOptions {
        skip_initialization: true,
        ..Default::default()
    };
    // Arguments are ignored when initialization is skipped.
    let result = orchestrator
        .deploy_upgradeable("PriceGetter", Vec::new(), options)
        .await?;

    assert!(!result.initialized);
    assert!(result.init_data.is_empty());
    let (_, _, data) = proxy_args(orchestrator.ledger().find("PriceGetter").unwrap());
    assert_eq!(data, "0x");
    Ok(())
}

#[tokio::test]
async fn test_supplied_proxy_admin_is_reused() -> Result<()> {
    let workspace = Workspace::new()?;
    let mut orchestrator = workspace.orchestrator("polygon", "price-getter", test_config())?;

    let options = UpgradeableOptions {
        name: Some("Oracle".to_string()),
        proxy_admin: Some(EXISTING_ADMIN),
        ..Default::default()
    };
    let result = orchestrator
        .deploy_upgradeable("PriceGetter", initializer_args(), options)
        .await?;

    assert_eq!(result.proxy_admin, EXISTING_ADMIN);
    assert_eq!(result.proxy_admin_owner, None);

    let ledger = orchestrator.ledger();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.find("Oracle_ProxyAdmin").is_none());
    let (_, proxy_admin, _) = proxy_args(ledger.find("Oracle").unwrap());
    assert_eq!(proxy_admin, EXISTING_ADMIN.to_checksum(None));
    Ok(())
}

#[tokio::test]
async fn test_proxy_admin_owner_override() -> Result<()> {
    let workspace = Workspace::new()?;
    let owner = Address::repeat_byte(0x0a);
    let config = rollout_deploy::OrchestratorConfig {
        proxy_admin_owner: Some(Address::repeat_byte(0x0b)),
        ..test_config()
    };
    let mut orchestrator = workspace.orchestrator("polygon", "price-getter", config)?;

    // The per-call owner wins over the configured one.
    let options = UpgradeableOptions {
        proxy_admin_owner: Some(owner),
        ..Default::default()
    };
    let result = orchestrator
        .deploy_upgradeable("PriceGetter", initializer_args(), options)
        .await?;
    assert_eq!(result.proxy_admin_owner, Some(owner));

    let admin = orchestrator.ledger().find("PriceGetter_ProxyAdmin").unwrap();
    assert_eq!(admin.constructor_arguments, [Value::String(owner.to_checksum(None))]);
    Ok(())
}

#[tokio::test]
async fn test_bad_initializer_fails_before_sending() -> Result<()> {
    let workspace = Workspace::new()?;
    let mut orchestrator = workspace.orchestrator("polygon", "price-getter", test_config())?;

    let err = orchestrator
        .deploy_upgradeable(
            "PriceGetter",
            vec![DynSolValue::Bool(true)],
            UpgradeableOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EncodingUnavailable);
    assert!(matches!(err, DeployError::EncodingUnavailable { .. }));
    assert!(orchestrator.client().sent().is_empty());
    assert!(orchestrator.ledger().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_standalone_admin_and_proxy() -> Result<()> {
    let workspace = Workspace::new()?;
    let mut orchestrator = workspace.orchestrator("polygon", "proxies", test_config())?;
    let implementation = Address::repeat_byte(0x11);
    let owner = Address::repeat_byte(0x22);

    let mut composer = ProxyComposer::new(&mut orchestrator);
    let first = composer.deploy_proxy_admin(owner).await?;
    let proxy = composer
        .deploy_transparent_proxy(implementation, first.address, Bytes::new())
        .await?;

    assert_eq!(first.name, "ProxyAdmin");
    assert_eq!(proxy.name, "TransparentUpgradeableProxy");
    assert!(proxy.upgradeable_proxy);
    let (logic, admin, data) = proxy_args(&proxy);
    assert_eq!(logic, implementation.to_checksum(None));
    assert_eq!(admin, first.address.to_checksum(None));
    assert_eq!(data, "0x");

    // Every call deploys a fresh contract under a name of its own.
    let other_owner = Address::repeat_byte(0x33);
    let second = composer.deploy_proxy_admin(other_owner).await?;
    let second_proxy = composer
        .deploy_transparent_proxy(implementation, second.address, Bytes::new())
        .await?;
    assert_eq!(second.name, "ProxyAdmin_2");
    assert_eq!(second_proxy.name, "TransparentUpgradeableProxy_2");
    assert_ne!(second.address, first.address);
    assert_eq!(
        second.constructor_arguments,
        [Value::String(other_owner.to_checksum(None))]
    );

    let names: Vec<_> = orchestrator.ledger().records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "ProxyAdmin",
            "TransparentUpgradeableProxy",
            "ProxyAdmin_2",
            "TransparentUpgradeableProxy_2"
        ]
    );
    assert_eq!(orchestrator.client().sent().len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_resumed_run_deploys_admin_for_new_owner() -> Result<()> {
    let workspace = Workspace::new()?;
    let owner_a = Address::repeat_byte(0x0a);
    let owner_b = Address::repeat_byte(0x0b);

    let first = {
        let mut orchestrator = workspace.orchestrator("polygon", "proxies", test_config())?;
        ProxyComposer::new(&mut orchestrator)
            .deploy_proxy_admin(owner_a)
            .await?
    };

    let mut orchestrator = workspace.orchestrator("polygon", "proxies", test_config())?;
    assert!(orchestrator.resume()?.is_some());
    let admin = ProxyComposer::new(&mut orchestrator)
        .deploy_proxy_admin(owner_b)
        .await?;

    assert_eq!(orchestrator.client().sent().len(), 1);
    assert_eq!(admin.name, "ProxyAdmin_2");
    assert_eq!(
        admin.constructor_arguments,
        [Value::String(owner_b.to_checksum(None))]
    );

    let ledger = orchestrator.ledger();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.find("ProxyAdmin"), Some(&first));
    assert_eq!(
        first.constructor_arguments,
        [Value::String(owner_a.to_checksum(None))]
    );
    Ok(())
}

#[tokio::test]
async fn test_upgradeable_task_uses_network_tables() -> Result<()> {
    let workspace = Workspace::new()?;
    let mut orchestrator = workspace.orchestrator("bsc-fork", "price-getter", test_config())?;

    let output = DeployTask::PriceGetter.run(&mut orchestrator).await?;

    let ledger = orchestrator.ledger();
    assert_eq!(ledger.len(), 3);
    let proxy = ledger.find("PriceGetter").unwrap();
    assert_eq!(output["priceGetter"], proxy.address.to_checksum(None));
    assert_eq!(
        output["priceGetterImplementation"],
        ledger.find("PriceGetter_Implementation").unwrap().address.to_checksum(None)
    );
    assert_eq!(output["config"]["oracles"].as_array().unwrap().len(), 4);
    Ok(())
}
