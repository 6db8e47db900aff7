//! Dine Sync 演示
//!
//! 在内存文档存储上跑一遍完整流程: 下单, 订单通知, 呼叫服务员,
//! 分页读取, 缓存读取。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dine_sync::cache::{CacheKey, CacheTtl};
use dine_sync::live::{Alerts, NotificationKind};
use dine_sync::{
    CacheManager, MemoryStore, OrderActions, OrderFilter, OrderNotifier, PaginatedOrders,
    PaginatedOrdersOptions, WaiterCallWatcher, setup_environment,
};
use shared::{NewOrder, OrderItem, OrderStatus};

const TENANT: &str = "demo-restaurant";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 日志) + 配置
    let config = setup_environment();
    tracing::info!(environment = %config.environment, "🍜 Dine sync demo starting...");

    // 2. 基础设施
    let store = Arc::new(MemoryStore::new());
    let cache = CacheManager::new(config.cache_config());
    let actions = OrderActions::new(store.clone());

    let alerts = Alerts::tracing();
    // 模拟操作员首次点击, 允许播放提示音
    alerts.chime.gate().record_interaction();
    let options = config.watcher_options().with_alerts(alerts);

    // 3. 挂载 watcher (baseline 不提醒)
    let notifier = OrderNotifier::mount(store.clone(), OrderFilter::tenant(TENANT), options.clone())
        .context("mount order notifier")?;
    let waiter_calls =
        WaiterCallWatcher::mount(store.clone(), TENANT, options).context("mount waiter calls")?;

    // 4. 客人下单 + 呼叫服务员
    for table in 1..=5u32 {
        let order = actions
            .place_order(NewOrder {
                tenant_id: TENANT.to_string(),
                sub_scope: None,
                table_number: table,
                items: vec![
                    OrderItem {
                        name: "Beef noodles".to_string(),
                        unit_price: 12.5,
                        quantity: 2,
                        note: None,
                    },
                    OrderItem {
                        name: "Jasmine tea".to_string(),
                        unit_price: 3.3,
                        quantity: 1,
                        note: None,
                    },
                ],
                total: 28.3,
            })
            .await
            .context("place order")?;
        if table % 2 == 0 {
            actions.update_status(&order.id, OrderStatus::Accepted).await?;
        }
    }
    let call = actions.create_waiter_call(TENANT, 3).await?;

    tracing::info!(
        orders = notifier.orders().len(),
        unread = notifier.unread_count(),
        pending_calls = waiter_calls.pending_count(),
        "Live state"
    );

    // 5. 员工处理呼叫
    waiter_calls.dismiss_call(&call.id).await?;
    tracing::info!(pending_calls = waiter_calls.pending_count(), "Waiter call dismissed");

    // 6. 分页读取订单历史
    let pager = PaginatedOrders::mount(
        store.clone(),
        PaginatedOrdersOptions::new(TENANT).with_page_size(config.page_size.min(2)),
    )
    .await;
    while pager.has_more() {
        pager.load_more().await;
    }
    tracing::info!(loaded = pager.len(), "Order history loaded");

    // 7. 菜单缓存
    let menu: Vec<String> = cache
        .cached_fetch(&CacheKey::menu(TENANT), Some(CacheTtl::MENU), false, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, anyhow::Error>(vec!["Beef noodles".to_string(), "Jasmine tea".to_string()])
        })
        .await?;
    tracing::info!(items = menu.len(), stats = ?cache.stats(), "Menu cached");

    let new_orders = notifier
        .notifications()
        .iter()
        .filter(|n| n.kind == NotificationKind::NewOrder)
        .count();
    tracing::info!(new_orders, "Demo finished");

    notifier.unmount();
    waiter_calls.unmount();
    Ok(())
}
