//! Puppeteer payloads for the Browserless `/function` endpoint. Each script
//! drives one page session and returns plain JSON; every decision about the
//! returned data happens on the Rust side.

/// Domain-mode listing walk: open the domain page, expand the "See all ads"
/// grid when present, then scroll with adaptive termination (result cap,
/// three zero-growth scrolls, or wall-clock ceiling) and return the creative
/// anchor hrefs in DOM order.
pub const LISTING_SCROLL: &str = r#"
export default async function ({ page, context }) {
  const { url, maxResults, maxScrolls, stallLimit, timeoutMs, scrollPauseMs, settleMs } = context;
  await page.setViewport({ width: 1920, height: 1080 });
  await page.goto(url, { waitUntil: "load", timeout: 60000 });
  await new Promise((r) => setTimeout(r, settleMs));

  let sawExpansion = false;
  try {
    const btn = await page.$("material-button.grid-expansion-button");
    if (btn) {
      sawExpansion = true;
      await btn.click();
      await new Promise((r) => setTimeout(r, 3000));
    }
  } catch (e) {}

  const startedAt = Date.now();
  let prevCount = 0;
  let stalls = 0;
  for (let i = 0; i < maxScrolls; i++) {
    if (Date.now() - startedAt > timeoutMs) break;
    const count = await page.evaluate(
      () => document.querySelectorAll('creative-preview a[href*="/creative/"]').length
    );
    if (maxResults > 0 && count >= maxResults) break;
    if (count === prevCount) {
      stalls += 1;
      if (stalls >= stallLimit) break;
    } else {
      stalls = 0;
    }
    prevCount = count;
    await page.evaluate(() => window.scrollTo(0, document.body.scrollHeight));
    await new Promise((r) => setTimeout(r, scrollPauseMs));
  }

  const anchors = await page.evaluate(() =>
    Array.from(document.querySelectorAll("creative-preview a"))
      .map((a) => a.getAttribute("href"))
      .filter((h) => h && h.includes("/creative/"))
  );
  return { data: { anchors, sawExpansion }, type: "application/json" };
}
"#;

/// Detail-page snapshot: wait for the ad container (absent container skips
/// the page), opportunistically wait for real content, then capture the top
/// document, the body text, and every frame's inner document. Frame capture
/// runs host-side so cross-origin frames are readable.
pub const DETAIL_SNAPSHOT: &str = r#"
export default async function ({ page, context }) {
  const { url, containerTimeoutMs, contentTimeoutMs } = context;
  await page.setViewport({ width: 1920, height: 1080 });
  try {
    await page.goto(url, { waitUntil: "domcontentloaded", timeout: 30000 });
  } catch (e) {
    return { data: { found: false, reason: "navigation: " + e.message }, type: "application/json" };
  }
  await new Promise((r) => setTimeout(r, 3000));
  try {
    await page.waitForSelector("creative-details .ad-container", { timeout: containerTimeoutMs });
  } catch (e) {
    return { data: { found: false, reason: "ad container missing" }, type: "application/json" };
  }
  try {
    await page.waitForSelector(
      'creative-details img[src*="simgad"], creative-details iframe[src*="youtube"], creative-details iframe[src*="sadbundle"]',
      { timeout: contentTimeoutMs }
    );
  } catch (e) {}
  await new Promise((r) => setTimeout(r, 1000));

  const advertiser = await page.evaluate(() => {
    const el = document.querySelector("div.advertiser-name");
    return el ? el.innerText.trim() : "";
  });
  const html = await page.content();
  const body_text = await page.evaluate(() => (document.body ? document.body.innerText : ""));
  const frames = [];
  for (const frame of page.frames()) {
    if (frame === page.mainFrame()) continue;
    let frameHtml = "";
    try {
      frameHtml = await frame.content();
    } catch (e) {}
    frames.push({ url: frame.url(), html: frameHtml });
  }
  return { data: { found: true, advertiser, html, body_text, frames }, type: "application/json" };
}
"#;

/// Keyword mode, step one: type the keyword and harvest the advertiser
/// dropdown (names in dropdown order).
pub const KEYWORD_ADVERTISERS: &str = r#"
export default async function ({ page, context }) {
  const { url, keyword } = context;
  await page.setViewport({ width: 1920, height: 1080 });
  await page.goto(url, { waitUntil: "load", timeout: 60000 });
  await new Promise((r) => setTimeout(r, 5000));
  const input = await page.waitForSelector('input[type="text"]', { timeout: 15000 });
  await input.click();
  await input.type(keyword);
  await new Promise((r) => setTimeout(r, 1000));
  await page.waitForSelector("material-select-item", { timeout: 15000 });
  await new Promise((r) => setTimeout(r, 1000));
  const advertisers = await page.evaluate(() =>
    Array.from(document.querySelectorAll("material-select-item")).map((item, idx) => {
      const nameEl = item.querySelector("div.name");
      return nameEl ? nameEl.innerText.trim() : "Unknown_" + idx;
    })
  );
  return { data: { advertisers }, type: "application/json" };
}
"#;

/// Keyword mode, step two: re-enter the search, click the advertiser at the
/// given dropdown index, and collect its creative anchors.
pub const KEYWORD_ADVERTISER_ADS: &str = r#"
export default async function ({ page, context }) {
  const { url, keyword, advertiserIndex, maxCreatives } = context;
  await page.setViewport({ width: 1920, height: 1080 });
  await page.goto(url, { waitUntil: "load", timeout: 60000 });
  await new Promise((r) => setTimeout(r, 5000));
  const input = await page.waitForSelector('input[type="text"]', { timeout: 15000 });
  await input.click();
  await input.type(keyword);
  await new Promise((r) => setTimeout(r, 1000));
  await page.waitForSelector("material-select-item", { timeout: 15000 });
  await new Promise((r) => setTimeout(r, 1000));
  const items = await page.$$("material-select-item");
  if (advertiserIndex >= items.length) {
    return { data: { anchors: [], reason: "advertiser index out of range" }, type: "application/json" };
  }
  await items[advertiserIndex].click();
  await page.waitForSelector("creative-preview", { timeout: 30000 });
  await new Promise((r) => setTimeout(r, 3000));
  let anchors = await page.evaluate(() =>
    Array.from(document.querySelectorAll("creative-preview a"))
      .map((a) => a.getAttribute("href"))
      .filter((h) => h && h.includes("/creative/"))
  );
  if (maxCreatives > 0) anchors = anchors.slice(0, maxCreatives);
  return { data: { anchors }, type: "application/json" };
}
"#;
